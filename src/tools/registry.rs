//! 进程内工具注册表
//!
//! 提供工具的注册、查找和执行，并作为 `ToolExecutor` 接入分发器

use super::types::{Tool, ToolError, ToolExecutor, ToolValidationError};
use crate::message::ToolDescriptor;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 工具注册表
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// 创建新的工具注册表
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// 注册工具
    pub fn register<T: Tool + 'static>(&self, tool: T) -> Result<(), ToolValidationError> {
        self.register_arc(Arc::new(tool))
    }

    /// 注册工具（Arc 版本）
    pub fn register_arc(&self, tool: Arc<dyn Tool>) -> Result<(), ToolValidationError> {
        let name = tool.name();
        if name.trim().is_empty() {
            return Err(ToolValidationError::EmptyName);
        }

        {
            let mut tools = self.tools.write();
            if tools.contains_key(&name) {
                return Err(ToolValidationError::DuplicateName(name));
            }
            tools.insert(name.clone(), tool);
        }

        info!("[ToolRegistry] 注册工具: {}", name);
        Ok(())
    }

    /// 注销工具
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.tools.write().remove(name).is_some();
        if removed {
            info!("[ToolRegistry] 注销工具: {}", name);
        }
        removed
    }

    /// 获取工具
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// 检查工具是否存在
    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// 导出工具目录（按名称排序，保证请求体稳定）
    pub fn descriptors(&self, owner_ref: &str) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> = self
            .tools
            .read()
            .values()
            .map(|t| t.descriptor(owner_ref))
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// 查找、校验并执行工具
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        debug!("[ToolRegistry] 执行工具: {}", name);
        tool.validate_args(&args)?;

        let result = tool.execute(args).await;
        if let Err(e) = &result {
            warn!("[ToolRegistry] 工具执行失败: {} - {}", name, e);
        }
        result
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn invoke(
        &self,
        owner_ref: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value, ToolError> {
        debug!("[ToolRegistry] invoke owner={} tool={}", owner_ref, tool_name);
        self.execute(tool_name, arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// 测试用的简单工具
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> String {
            "echo".to_string()
        }

        fn description(&self) -> String {
            "Echo the input message".to_string()
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            })
        }

        async fn execute(&self, args: Value) -> Result<Value, ToolError> {
            let message = args
                .get("message")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolError::MalformedArguments("message 必须是字符串".to_string()))?;
            Ok(json!({ "echo": message }))
        }
    }

    /// 无效工具（空名称）
    struct InvalidTool;

    #[async_trait]
    impl Tool for InvalidTool {
        fn name(&self) -> String {
            String::new()
        }

        fn description(&self) -> String {
            "Invalid tool with empty name".to_string()
        }

        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_registry_register_and_get() {
        let registry = ToolRegistry::new();

        assert!(registry.register(EchoTool).is_ok());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().name(), "echo");
        assert!(registry.contains("echo"));
        assert!(!registry.contains("nonexistent"));
    }

    #[test]
    fn test_registry_reject_invalid_and_duplicate() {
        let registry = ToolRegistry::new();

        assert_eq!(
            registry.register(InvalidTool),
            Err(ToolValidationError::EmptyName)
        );
        registry.register(EchoTool).unwrap();
        assert!(matches!(
            registry.register(EchoTool),
            Err(ToolValidationError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_registry_unregister() {
        let registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        assert!(registry.unregister("echo"));
        assert!(registry.is_empty());
        assert!(!registry.unregister("echo"));
    }

    #[test]
    fn test_registry_descriptors() {
        let registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        let descriptors = registry.descriptors("local");
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "echo");
        assert_eq!(descriptors[0].owner_ref, "local");
        assert_eq!(descriptors[0].parameters()["required"][0], "message");
    }

    #[tokio::test]
    async fn test_registry_invoke() {
        let registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        let result = registry
            .invoke("local", "echo", json!({"message": "Hello, World!"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"echo": "Hello, World!"}));
    }

    #[tokio::test]
    async fn test_registry_execute_not_found() {
        let registry = ToolRegistry::new();
        let result = registry.execute("nonexistent", json!({})).await;
        assert_eq!(result, Err(ToolError::UnknownTool("nonexistent".to_string())));
    }

    #[tokio::test]
    async fn test_registry_execute_missing_required_arg() {
        let registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();

        let result = registry.execute("echo", json!({})).await;
        assert!(matches!(result, Err(ToolError::MalformedArguments(_))));
    }
}
