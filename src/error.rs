//! 错误类型
//!
//! 定义对话编排过程中可能发生的错误。
//! 传输层错误（超时、网络、Provider）对当前调用是致命的；
//! 工具层错误见 `tools::ToolError`，它们不会越过分发器边界。

use serde_json::Value;
use thiserror::Error;

/// Provider 错误信息中原始响应体的最大保留长度
const MAX_ERROR_BODY_CHARS: usize = 500;

/// 编排错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// 请求超时
    #[error("请求超时（{timeout_ms}ms）：请稍后重试，或换用响应更快的模型")]
    Timeout { timeout_ms: u64 },

    /// 网络连接失败（DNS、连接被拒绝等）
    #[error("网络请求失败：{0}。请检查 endpoint 配置和网络连接")]
    NetworkFailure(String),

    /// Provider 返回了非成功状态或 API 级错误
    #[error("{}", provider_error_display(*status, message))]
    ProviderError {
        status: Option<u16>,
        message: String,
    },

    /// 配置缺失必填字段
    #[error("LLM 未配置: {0}")]
    NotConfigured(String),

    /// 调用方传入的历史消息违反消息模型约束
    #[error("历史消息无效: {0}")]
    InvalidHistory(String),
}

fn provider_error_display(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Provider 返回错误 (HTTP {code}): {message}"),
        None => format!("Provider 返回错误: {message}"),
    }
}

impl LlmError {
    /// 创建 Provider 错误
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        LlmError::ProviderError {
            status,
            message: message.into(),
        }
    }

    /// 根据 HTTP 状态码和响应体创建 Provider 错误
    ///
    /// 优先提取 Provider 自己的错误文本，不会把原始 JSON 直接暴露给调用方
    pub fn from_response_body(status: u16, body: &str) -> Self {
        LlmError::ProviderError {
            status: Some(status),
            message: extract_provider_message(body),
        }
    }

    /// 获取错误类型字符串
    pub fn error_type(&self) -> &'static str {
        match self {
            LlmError::Timeout { .. } => "timeout_error",
            LlmError::NetworkFailure(_) => "network_error",
            LlmError::ProviderError { .. } => "provider_error",
            LlmError::NotConfigured(_) => "config_error",
            LlmError::InvalidHistory(_) => "invalid_history",
        }
    }

    /// 获取对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            LlmError::Timeout { .. } => 408,
            LlmError::NetworkFailure(_) => 502,
            LlmError::ProviderError { status, .. } => status.unwrap_or(502),
            LlmError::NotConfigured(_) => 400,
            LlmError::InvalidHistory(_) => 400,
        }
    }

    /// 检查是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Timeout { .. } | LlmError::NetworkFailure(_) => true,
            LlmError::ProviderError { status, .. } => {
                matches!(status, Some(429) | Some(500..=599))
            }
            _ => false,
        }
    }

    /// 转换为 JSON 错误响应
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": self.error_type(),
                "code": self.status_code()
            }
        })
    }
}

/// JSON 错误响应中既没有文本也没有状态码时的提示
const UNRECOGNIZED_ERROR_BODY: &str = "Provider 返回了无法识别的错误响应";

/// 从 Provider 错误响应体中提取可读的错误信息
///
/// JSON 响应体交给 [`describe_error_value`]；只有非 JSON 文本才截断后原样返回。
pub fn extract_provider_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "响应体为空".to_string();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => {
            describe_error_value(&value).unwrap_or_else(|| UNRECOGNIZED_ERROR_BODY.to_string())
        }
        Err(_) => truncate_chars(trimmed, MAX_ERROR_BODY_CHARS),
    }
}

/// 描述一个 JSON 错误值
///
/// 依次尝试 `error.message`、`error`（字符串）、`message`、`detail`；
/// 都没有时用 `status` 与 `code` 拼出 `UNAVAILABLE (503)` 这样的描述。
/// 既可以传完整响应体，也可以传其中的 `error` 对象。
pub(crate) fn describe_error_value(value: &Value) -> Option<String> {
    // Gemini 偶尔返回数组包裹的错误对象
    let value = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let inner = value
        .get("error")
        .filter(|v| v.is_object())
        .unwrap_or(value);

    let candidates = [
        inner.get("message"),
        value.get("error").filter(|v| v.is_string()),
        value.get("message"),
        value.get("detail"),
        Some(value),
    ];
    let text = candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|t| !t.is_empty());
    if let Some(text) = text {
        return Some(text.to_string());
    }

    let status = inner
        .get("status")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let code = inner.get("code").and_then(|c| match c {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    });
    match (status, code) {
        (Some(status), Some(code)) => Some(format!("{status} ({code})")),
        (Some(status), None) => Some(status.to_string()),
        (None, Some(code)) => Some(format!("错误码 {code}")),
        (None, None) => None,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
