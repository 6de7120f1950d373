//! 传输保护
//!
//! 包装 Provider 的 HTTP 调用：统一超时，并把失败归类到 `LlmError` 的三种传输错误

use super::timeout::{TimeoutConfig, TimeoutController, TimeoutError};
use crate::config::ProviderConfig;
use crate::error::LlmError;
use crate::logger::sanitize_log_message;
use reqwest::RequestBuilder;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, error, warn};

/// 传输保护器
///
/// 三个适配器共用，保证调用方看到一致的错误形态
#[derive(Debug, Clone)]
pub struct TransportGuard {
    controller: TimeoutController,
}

impl TransportGuard {
    /// 创建传输保护器，`timeout_ms` 为 0 表示无超时
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            controller: TimeoutController::new(TimeoutConfig::new(timeout_ms)),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.timeout_ms)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.controller.config().request_timeout_ms
    }

    /// 带超时执行一次传输操作
    pub async fn run<F, T>(&self, operation: F) -> Result<T, LlmError>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        match self.controller.execute_with_timeout(operation).await {
            Ok(result) => result,
            Err(TimeoutError::RequestTimeout {
                timeout_ms,
                elapsed_ms,
            }) => {
                warn!(
                    "[TransportGuard] 请求超时: 配置 {}ms, 已耗时 {}ms",
                    timeout_ms, elapsed_ms
                );
                Err(LlmError::Timeout { timeout_ms })
            }
        }
    }

    /// 发送请求并解析 JSON 响应
    ///
    /// 非 2xx 响应转换为 `ProviderError`，并提取 Provider 自己的错误文本
    pub async fn send_json(&self, request: RequestBuilder) -> Result<Value, LlmError> {
        let timeout_ms = self.timeout_ms();
        self.run(async move {
            let response = request
                .send()
                .await
                .map_err(|e| classify_reqwest_error(&e, timeout_ms))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| classify_reqwest_error(&e, timeout_ms))?;

            if !status.is_success() {
                error!(
                    "[TransportGuard] Provider 返回错误: {} - {}",
                    status,
                    sanitize_log_message(&body)
                );
                return Err(LlmError::from_response_body(status.as_u16(), &body));
            }

            debug!("[TransportGuard] 响应成功: {} ({} bytes)", status, body.len());
            serde_json::from_str::<Value>(&body).map_err(|e| {
                LlmError::provider(Some(status.as_u16()), format!("响应不是有效的 JSON: {e}"))
            })
        })
        .await
    }
}

/// 把 HTTP 客户端错误归类为传输错误
///
/// 错误文本中可能带有包含 API Key 的 URL，统一脱敏后再返回
pub fn classify_reqwest_error(err: &reqwest::Error, timeout_ms: u64) -> LlmError {
    if err.is_timeout() {
        return LlmError::Timeout { timeout_ms };
    }
    let message = sanitize_log_message(&err.to_string());
    if err.is_decode() {
        return LlmError::provider(
            err.status().map(|s| s.as_u16()),
            format!("响应解析失败: {message}"),
        );
    }
    if let Some(status) = err.status() {
        return LlmError::provider(Some(status.as_u16()), message);
    }
    error!("[TransportGuard] 网络请求失败: {}", message);
    LlmError::NetworkFailure(message)
}
