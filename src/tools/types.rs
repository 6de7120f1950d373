//! 工具类型定义
//!
//! 定义工具执行的错误类型、执行服务契约和进程内工具 trait

use crate::message::ToolDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 工具执行错误
///
/// 只在分发器内部流转，最终会被转换为工具结果消息
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    /// 工具目录或执行服务中找不到该工具
    #[error("未知工具: {0}")]
    UnknownTool(String),

    /// 参数不是合法的 JSON 对象
    #[error("工具参数格式错误: {0}")]
    MalformedArguments(String),

    /// 工具执行失败
    #[error("工具执行失败: {0}")]
    ExecutionFailed(String),

    /// 与执行服务通信失败
    #[error("工具服务通信失败: {0}")]
    Transport(String),
}

/// 工具定义校验错误
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolValidationError {
    #[error("工具名称不能为空")]
    EmptyName,

    #[error("工具名称重复: {0}")]
    DuplicateName(String),
}

/// 工具执行服务
///
/// 按 `owner_ref` 定位服务并执行工具，对传输方式不做假设
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn invoke(
        &self,
        owner_ref: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value, ToolError>;
}

/// 进程内工具
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称
    fn name(&self) -> String;

    /// 工具描述（供 LLM 理解）
    fn description(&self) -> String;

    /// 参数 JSON Schema
    fn input_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;

    /// 验证参数
    ///
    /// 默认实现检查参数为对象且包含 schema 中的必需字段
    fn validate_args(&self, args: &Value) -> Result<(), ToolError> {
        let obj = args
            .as_object()
            .ok_or_else(|| ToolError::MalformedArguments("参数必须是 JSON 对象".to_string()))?;

        let schema = self.input_schema();
        let required = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>())
            .unwrap_or_default();

        for name in required {
            if !obj.contains_key(name) {
                return Err(ToolError::MalformedArguments(format!(
                    "缺少必需参数: {}",
                    name
                )));
            }
        }
        Ok(())
    }

    /// 生成工具描述
    fn descriptor(&self, owner_ref: &str) -> ToolDescriptor {
        ToolDescriptor::new(self.name(), self.description(), owner_ref)
            .with_input_schema(self.input_schema())
    }
}
