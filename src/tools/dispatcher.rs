//! 工具分发器
//!
//! 把模型发出的工具调用路由到执行服务，并把结果（包括失败）转换为工具结果消息。
//! 工具层错误在这里变成数据，不会中断对话

use super::types::{ToolError, ToolExecutor};
use crate::message::{find_tool, Message, ToolCall, ToolDescriptor};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// 未知工具的错误原因
pub const UNKNOWN_TOOL_REASON: &str = "unknown tool/owner";

/// 工具分发器
#[derive(Clone)]
pub struct ToolDispatcher {
    executor: Arc<dyn ToolExecutor>,
}

impl ToolDispatcher {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self { executor }
    }

    /// 执行一个工具调用，总是返回工具结果消息
    pub async fn execute(&self, call: &ToolCall, catalog: &[ToolDescriptor]) -> Message {
        let content = match self.try_execute(call, catalog).await {
            Ok(result) => {
                info!("[ToolDispatcher] 工具执行成功: {} ({})", call.name, call.id);
                result
            }
            Err(e) => {
                warn!("[ToolDispatcher] 工具执行失败: {} ({}) - {}", call.name, call.id, e);
                error_content(&e)
            }
        };
        Message::tool(call.id.clone(), call.name.clone(), content)
    }

    /// 按接收顺序依次执行一组工具调用
    pub async fn execute_all(&self, calls: &[ToolCall], catalog: &[ToolDescriptor]) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute(call, catalog).await);
        }
        results
    }

    async fn try_execute(
        &self,
        call: &ToolCall,
        catalog: &[ToolDescriptor],
    ) -> Result<Value, ToolError> {
        let descriptor =
            find_tool(catalog, &call.name).ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        if !call.has_structured_arguments() {
            return Err(ToolError::MalformedArguments(format!(
                "参数必须是 JSON 对象，收到: {}",
                call.arguments_string()
            )));
        }

        info!(
            "[ToolDispatcher] 调用工具: {} owner={}",
            call.name, descriptor.owner_ref
        );
        let result = self
            .executor
            .invoke(&descriptor.owner_ref, &call.name, call.arguments.clone())
            .await?;
        flatten_mcp_result(result)
    }
}

/// 把工具错误转换为消息内容
pub fn error_content(err: &ToolError) -> Value {
    match err {
        ToolError::UnknownTool(name) => json!({
            "error": err.to_string(),
            "reason": UNKNOWN_TOOL_REASON,
            "tool": name,
        }),
        _ => json!({ "error": err.to_string() }),
    }
}

/// MCP 结果中 `isError: true` 视为执行失败，其余结果原样返回
fn flatten_mcp_result(result: Value) -> Result<Value, ToolError> {
    if result.get("isError").and_then(Value::as_bool) != Some(true) {
        return Ok(result);
    }

    let text = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "工具返回错误".to_string());
    Err(ToolError::ExecutionFailed(text))
}
