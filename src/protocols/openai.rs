//! OpenAI 协议实现
//!
//! 实现 OpenAI Chat Completions API 协议（非流式）
//! 适用于 OpenAI 及各类兼容服务，Qwen 复用本实现

use super::{api_error_from_body, new_call_id, HttpRequestSpec, Protocol, TurnResponse};
use crate::config::{ProviderConfig, ProviderKind};
use crate::error::LlmError;
use crate::message::{value_to_text, Message, ToolCall, ToolDescriptor};
use crate::models::openai::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, FunctionCall, FunctionDef, Tool,
    ToolCall as OpenAIToolCall,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// OpenAI 协议处理器
pub struct OpenAIProtocol;

impl OpenAIProtocol {
    /// 将规范化消息转换为 OpenAI ChatMessage
    fn convert_to_chat_message(msg: &Message) -> ChatMessage {
        match msg {
            Message::System { content } => ChatMessage::text("system", content.clone()),
            Message::User { content } => ChatMessage::text("user", content.clone()),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let calls: Vec<OpenAIToolCall> = tool_calls
                    .iter()
                    .map(|tc| OpenAIToolCall {
                        id: tc.id.clone(),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: tc.name.clone(),
                            arguments: Value::String(tc.arguments_string()),
                        },
                    })
                    .collect();
                ChatMessage {
                    role: "assistant".to_string(),
                    content: if content.is_empty() && !calls.is_empty() {
                        None
                    } else {
                        Some(content.clone())
                    },
                    tool_calls: if calls.is_empty() { None } else { Some(calls) },
                    tool_call_id: None,
                }
            }
            // 工具结果只能以字符串发送
            Message::Tool {
                tool_call_id,
                content,
                ..
            } => ChatMessage {
                role: "tool".to_string(),
                content: Some(value_to_text(content)),
                tool_calls: None,
                tool_call_id: Some(tool_call_id.clone()),
            },
        }
    }

    /// 把工具目录转换为 function calling 声明；目录为空时不输出 `tools`
    fn convert_tools(tools: &[ToolDescriptor]) -> Option<Vec<Tool>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|t| Tool::Function {
                    function: FunctionDef {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters(),
                    },
                })
                .collect(),
        )
    }

    /// 构建发往指定 endpoint 的请求
    pub fn build_request_to(
        endpoint: &str,
        history: &[Message],
        tools: &[ToolDescriptor],
        config: &ProviderConfig,
    ) -> Result<HttpRequestSpec, LlmError> {
        let request = ChatCompletionRequest {
            model: config.resolved_model(),
            messages: history.iter().map(Self::convert_to_chat_message).collect(),
            tools: Self::convert_tools(tools),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| LlmError::provider(None, format!("请求序列化失败: {e}")))?;

        Ok(HttpRequestSpec {
            url: endpoint.to_string(),
            query: Vec::new(),
            bearer_token: Some(config.trimmed_api_key().to_string()),
            body,
        })
    }

    /// 解析工具调用参数：字符串按 JSON 解析，失败时保留原始字符串
    fn parse_arguments(raw: &Value) -> Value {
        match raw {
            Value::Null => Value::Object(Default::default()),
            Value::String(s) if s.trim().is_empty() => Value::Object(Default::default()),
            Value::String(s) => {
                serde_json::from_str::<Value>(s).unwrap_or_else(|_| Value::String(s.clone()))
            }
            other => other.clone(),
        }
    }

    /// 解析 Chat Completions 响应
    pub fn parse_chat_completion(body: &Value) -> Result<TurnResponse, LlmError> {
        let response: ChatCompletionResponse = serde_json::from_value(body.clone())
            .map_err(|e| LlmError::provider(Some(200), format!("响应格式无法识别: {e}")))?;

        if let Some(error) = &response.error {
            return Err(api_error_from_body(error));
        }

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::provider(Some(200), "响应中没有 choices"))?;

        let content = choice.message.content.unwrap_or_default();
        let mut tool_calls = Vec::new();
        for tc in choice.message.tool_calls.unwrap_or_default() {
            if tc.function.name.is_empty() {
                warn!("[OpenAIProtocol] 忽略缺少函数名的工具调用: id={}", tc.id);
                continue;
            }
            let id = if tc.id.is_empty() {
                new_call_id()
            } else {
                tc.id
            };
            tool_calls.push(ToolCall::new(
                id,
                tc.function.name,
                Self::parse_arguments(&tc.function.arguments),
            ));
        }

        info!(
            "[OpenAIProtocol] 响应解析完成: content_len={}, tool_calls={}",
            content.len(),
            tool_calls.len()
        );
        Ok(TurnResponse::new(content, tool_calls))
    }
}

#[async_trait]
impl Protocol for OpenAIProtocol {
    fn name(&self) -> &'static str {
        "OpenAIProtocol"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    fn build_request(
        &self,
        history: &[Message],
        tools: &[ToolDescriptor],
        config: &ProviderConfig,
    ) -> Result<HttpRequestSpec, LlmError> {
        let endpoint = config
            .trimmed_endpoint()
            .ok_or_else(|| LlmError::NotConfigured("openai 需要配置 endpoint".to_string()))?;
        Self::build_request_to(endpoint, history, tools, config)
    }

    fn parse_response(&self, body: &Value) -> Result<TurnResponse, LlmError> {
        Self::parse_chat_completion(body)
    }
}
