//! 传输保护属性测试
//!
//! 使用 proptest 进行属性测试

use crate::error::LlmError;
use crate::resilience::TransportGuard;
use proptest::prelude::*;
use std::time::{Duration, Instant};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// 对于任意超时配置，永不完成的调用都以 Timeout 结束，且携带配置的超时值
    #[test]
    fn prop_pending_call_times_out(timeout_ms in 1u64..=20u64) {
        let guard = TransportGuard::new(timeout_ms);
        let rt = runtime();

        let start = Instant::now();
        let result: Result<(), LlmError> = rt.block_on(guard.run(std::future::pending()));
        let elapsed = start.elapsed();

        prop_assert_eq!(result, Err(LlmError::Timeout { timeout_ms }));
        prop_assert!(elapsed >= Duration::from_millis(timeout_ms));
        prop_assert!(elapsed < Duration::from_millis(timeout_ms + 500));
    }

    /// 立即完成的调用结果原样返回，不受超时配置影响
    #[test]
    fn prop_ready_call_passes_through(timeout_ms in 0u64..=1000u64, value in any::<i64>()) {
        let guard = TransportGuard::new(timeout_ms);
        let rt = runtime();

        let result = rt.block_on(guard.run(async move { Ok::<i64, LlmError>(value) }));

        prop_assert_eq!(result, Ok(value));
    }
}
