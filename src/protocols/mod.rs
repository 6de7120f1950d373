//! 协议策略模块
//!
//! 每种 Provider 线协议实现同一个 `Protocol` trait，编排器只持有 trait 对象，
//! 不在对话流程中按 Provider 类型分支

mod gemini;
mod openai;
mod qwen;

pub use gemini::GeminiProtocol;
pub use openai::OpenAIProtocol;
pub use qwen::QwenProtocol;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{describe_error_value, LlmError};
use crate::logger::sanitize_log_message;
use crate::message::{Message, ToolCall, ToolDescriptor};
use crate::resilience::TransportGuard;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// 一次 HTTP 请求的完整描述（纯数据，便于测试）
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestSpec {
    /// 完整 URL（不含查询参数）
    pub url: String,
    /// 查询参数
    pub query: Vec<(String, String)>,
    /// Bearer token（通过 Authorization 头发送）
    pub bearer_token: Option<String>,
    /// JSON 请求体
    pub body: Value,
}

/// 单轮响应
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResponse {
    /// 助手文本（只有工具调用时可能为空）
    pub content: String,
    /// 模型请求执行的工具
    pub tool_calls: Vec<ToolCall>,
    /// 规范化后的助手消息，原样追加到历史中
    pub raw_assistant_message: Message,
}

impl TurnResponse {
    pub fn new(content: String, tool_calls: Vec<ToolCall>) -> Self {
        let raw_assistant_message =
            Message::assistant_with_tool_calls(content.clone(), tool_calls.clone());
        Self {
            content,
            tool_calls,
            raw_assistant_message,
        }
    }

    /// 是否有工具调用
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// 协议处理器 trait
///
/// 定义了所有协议必须实现的方法。实现不得修改传入的历史
#[async_trait]
pub trait Protocol: Send + Sync {
    /// 协议名称（用于日志）
    fn name(&self) -> &'static str;

    /// 协议服务的 Provider 类型
    fn kind(&self) -> ProviderKind;

    /// 把规范化历史和工具目录翻译为本协议的请求
    fn build_request(
        &self,
        history: &[Message],
        tools: &[ToolDescriptor],
        config: &ProviderConfig,
    ) -> Result<HttpRequestSpec, LlmError>;

    /// 解析 2xx 响应体
    fn parse_response(&self, body: &Value) -> Result<TurnResponse, LlmError>;

    /// 执行一轮请求
    async fn send_turn(
        &self,
        client: &Client,
        history: &[Message],
        tools: &[ToolDescriptor],
        config: &ProviderConfig,
    ) -> Result<TurnResponse, LlmError> {
        let spec = self.build_request(history, tools, config)?;
        debug!(
            "[{}] POST {} history_len={} tools_count={}",
            self.name(),
            sanitize_log_message(&spec.url),
            history.len(),
            tools.len()
        );

        let mut request = client
            .post(&spec.url)
            .header("Content-Type", "application/json");
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(token) = &spec.bearer_token {
            request = request.bearer_auth(token);
        }
        let request = request.json(&spec.body);

        let body = TransportGuard::from_config(config)
            .send_json(request)
            .await?;
        self.parse_response(&body)
    }
}

/// 根据 ProviderKind 创建协议处理器
pub fn create_protocol(kind: ProviderKind) -> Box<dyn Protocol> {
    match kind {
        ProviderKind::OpenAI => Box::new(OpenAIProtocol),
        ProviderKind::Gemini => Box::new(GeminiProtocol),
        ProviderKind::Qwen => Box::new(QwenProtocol),
    }
}

/// 生成本地工具调用 ID（Gemini 线格式不提供 ID）
pub(crate) fn new_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// 从 200 响应体中的 `error` 字段提取 API 级错误
pub(crate) fn api_error_from_body(error: &Value) -> LlmError {
    let message = describe_error_value(error)
        .unwrap_or_else(|| "Provider 返回了无法识别的错误".to_string());
    let status = error
        .get("code")
        .and_then(|c| c.as_u64())
        .and_then(|c| u16::try_from(c).ok());
    LlmError::provider(status, message)
}

#[cfg(test)]
mod tests;
