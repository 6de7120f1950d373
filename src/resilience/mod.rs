//! 传输保护模块
//!
//! 为每次 Provider HTTP 调用提供超时控制，并把传输层失败归类为
//! 超时 / 网络失败 / Provider 错误三类

mod guard;
mod timeout;

pub use guard::{classify_reqwest_error, TransportGuard};
pub use timeout::{TimeoutConfig, TimeoutController, TimeoutError};

#[cfg(test)]
mod tests;
