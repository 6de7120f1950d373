//! 超时控制
//!
//! 单次 Provider / 工具调用的超时；超时是调用方唯一的取消手段

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

/// 超时配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutConfig {
    /// 请求超时（毫秒），0 表示不限时
    pub request_timeout_ms: u64,
}

impl TimeoutConfig {
    pub fn new(request_timeout_ms: u64) -> Self {
        Self { request_timeout_ms }
    }

    /// 生效的超时时长，未启用时为 `None`
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

/// 超时错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeoutError {
    #[error("请求超时: 配置 {timeout_ms}ms, 已耗时 {elapsed_ms}ms")]
    RequestTimeout { timeout_ms: u64, elapsed_ms: u64 },
}

/// 超时控制器
#[derive(Debug, Clone)]
pub struct TimeoutController {
    config: TimeoutConfig,
}

impl TimeoutController {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    /// 在配置的时限内等待 `operation` 完成
    pub async fn execute_with_timeout<F, T>(&self, operation: F) -> Result<T, TimeoutError>
    where
        F: Future<Output = T>,
    {
        let Some(limit) = self.config.request_timeout() else {
            return Ok(operation.await);
        };

        let started = Instant::now();
        tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| TimeoutError::RequestTimeout {
                timeout_ms: self.config.request_timeout_ms,
                elapsed_ms: started.elapsed().as_millis() as u64,
            })
    }
}
