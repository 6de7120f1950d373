//! Qwen（DashScope 兼容模式）协议实现
//!
//! 线格式与 OpenAI 完全一致，只是 endpoint 固定

use super::{HttpRequestSpec, OpenAIProtocol, Protocol, TurnResponse};
use crate::config::{ProviderConfig, ProviderKind, QWEN_ENDPOINT};
use crate::error::LlmError;
use crate::message::{Message, ToolDescriptor};
use async_trait::async_trait;
use serde_json::Value;

/// Qwen 协议处理器
pub struct QwenProtocol;

#[async_trait]
impl Protocol for QwenProtocol {
    fn name(&self) -> &'static str {
        "QwenProtocol"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Qwen
    }

    fn build_request(
        &self,
        history: &[Message],
        tools: &[ToolDescriptor],
        config: &ProviderConfig,
    ) -> Result<HttpRequestSpec, LlmError> {
        OpenAIProtocol::build_request_to(QWEN_ENDPOINT, history, tools, config)
    }

    fn parse_response(&self, body: &Value) -> Result<TurnResponse, LlmError> {
        OpenAIProtocol::parse_chat_completion(body)
    }
}
