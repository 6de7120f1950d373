//! Gemini 协议实现
//!
//! 实现 Gemini generateContent 协议（非流式）。
//! 线格式只有 `user` / `model` 两种角色，系统提示通过 `system_instruction` 单独发送

use super::{api_error_from_body, new_call_id, HttpRequestSpec, Protocol, TurnResponse};
use crate::config::{ProviderConfig, ProviderKind, DEFAULT_GEMINI_BASE_URL};
use crate::error::LlmError;
use crate::message::{Message, ToolCall, ToolDescriptor};
use crate::models::gemini::{
    Content, FunctionDeclaration, GenerateContentRequest, GenerateContentResponse, Part,
    SystemInstruction, ToolDeclarations,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

/// 表示候选内容被异常终止的 finishReason
const ABORTED_FINISH_REASONS: &[&str] = &[
    "MALFORMED_FUNCTION_CALL",
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Gemini 协议处理器
pub struct GeminiProtocol;

impl GeminiProtocol {
    /// 拆分历史：开头的 system 消息作为 system_instruction，其余转换为 contents
    fn convert_history(history: &[Message]) -> (Option<SystemInstruction>, Vec<Content>) {
        let (system_instruction, rest) = match history.split_first() {
            Some((Message::System { content }, rest)) => (
                Some(SystemInstruction {
                    parts: vec![Part::text(content.clone())],
                }),
                rest,
            ),
            _ => (None, history),
        };

        let contents = rest.iter().map(Self::convert_message).collect();
        (system_instruction, contents)
    }

    fn convert_message(msg: &Message) -> Content {
        match msg {
            // 非开头位置的 system 消息按用户文本发送
            Message::System { content } | Message::User { content } => Content {
                role: "user".to_string(),
                parts: vec![Part::text(content.clone())],
            },
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut parts = Vec::with_capacity(tool_calls.len() + 1);
                if !content.is_empty() {
                    parts.push(Part::text(content.clone()));
                }
                for tc in tool_calls {
                    parts.push(Part::function_call(
                        tc.name.clone(),
                        Self::object_or_wrapped(&tc.arguments, "arguments"),
                    ));
                }
                if parts.is_empty() {
                    parts.push(Part::text(""));
                }
                Content {
                    role: "model".to_string(),
                    parts,
                }
            }
            Message::Tool {
                tool_name, content, ..
            } => Content {
                role: "model".to_string(),
                parts: vec![Part::function_response(
                    tool_name.clone(),
                    Self::object_or_wrapped(content, "content"),
                )],
            },
        }
    }

    /// Gemini 要求 args / response 为对象，其它值包一层
    fn object_or_wrapped(value: &Value, key: &str) -> Value {
        if value.is_object() {
            return value.clone();
        }
        let mut wrapped = serde_json::Map::new();
        wrapped.insert(key.to_string(), value.clone());
        Value::Object(wrapped)
    }

    fn convert_tools(tools: &[ToolDescriptor]) -> Option<Vec<ToolDeclarations>> {
        if tools.is_empty() {
            return None;
        }
        Some(vec![ToolDeclarations {
            function_declarations: tools
                .iter()
                .map(|t| FunctionDeclaration {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters(),
                })
                .collect(),
        }])
    }

    /// 生成 generateContent URL
    ///
    /// endpoint 为基础地址（如 `.../v1beta`）；已是完整 `:generateContent` 地址时原样使用
    fn build_url(config: &ProviderConfig) -> String {
        let base = config
            .trimmed_endpoint()
            .unwrap_or(DEFAULT_GEMINI_BASE_URL)
            .trim_end_matches('/');
        if base.ends_with(":generateContent") {
            return base.to_string();
        }
        format!("{}/models/{}:generateContent", base, config.resolved_model())
    }
}

#[async_trait]
impl Protocol for GeminiProtocol {
    fn name(&self) -> &'static str {
        "GeminiProtocol"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn build_request(
        &self,
        history: &[Message],
        tools: &[ToolDescriptor],
        config: &ProviderConfig,
    ) -> Result<HttpRequestSpec, LlmError> {
        let (system_instruction, contents) = Self::convert_history(history);
        let request = GenerateContentRequest {
            contents,
            system_instruction,
            tools: Self::convert_tools(tools),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| LlmError::provider(None, format!("请求序列化失败: {e}")))?;

        Ok(HttpRequestSpec {
            url: Self::build_url(config),
            query: vec![("key".to_string(), config.trimmed_api_key().to_string())],
            bearer_token: None,
            body,
        })
    }

    fn parse_response(&self, body: &Value) -> Result<TurnResponse, LlmError> {
        let response: GenerateContentResponse = serde_json::from_value(body.clone())
            .map_err(|e| LlmError::provider(Some(200), format!("响应格式无法识别: {e}")))?;

        if let Some(error) = &response.error {
            return Err(api_error_from_body(error));
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("请求被拦截: {r}"))
                .unwrap_or_else(|| "响应中没有 candidates".to_string());
            return Err(LlmError::provider(Some(200), reason));
        };

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if part.thought == Some(true) {
                continue;
            }
            if let Some(text) = part.text {
                content.push_str(&text);
            }
            if let Some(call) = part.function_call {
                if call.name.is_empty() {
                    warn!("[GeminiProtocol] 忽略缺少函数名的 functionCall");
                    continue;
                }
                let args = if call.args.is_null() {
                    json!({})
                } else {
                    call.args
                };
                tool_calls.push(ToolCall::new(new_call_id(), call.name, args));
            }
        }

        info!(
            "[GeminiProtocol] 响应解析完成: content_len={}, tool_calls={}, finish_reason={:?}",
            content.len(),
            tool_calls.len(),
            candidate.finish_reason
        );

        // 没有任何产出且被异常终止时，空文本不能当作正常完成
        if content.is_empty() && tool_calls.is_empty() {
            if let Some(reason) = candidate
                .finish_reason
                .as_deref()
                .filter(|r| ABORTED_FINISH_REASONS.contains(r))
            {
                warn!("[GeminiProtocol] 候选内容被终止: finish_reason={}", reason);
                return Err(LlmError::provider(
                    Some(200),
                    format!("响应被终止: {reason}"),
                ));
            }
        }
        Ok(TurnResponse::new(content, tool_calls))
    }
}
