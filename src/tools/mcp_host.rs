//! 本地工具宿主客户端
//!
//! 通过 HTTP 访问工具宿主：
//! - `GET  {base}/tools` 列出所有已启动服务的工具
//! - `POST {base}/tools/{name}/call` 调用指定服务上的工具

use super::types::{ToolError, ToolExecutor};
use crate::config::ToolHostConfig;
use crate::error::LlmError;
use crate::message::ToolDescriptor;
use crate::resilience::TransportGuard;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ToolListResponse {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

/// 工具宿主客户端
#[derive(Debug, Clone)]
pub struct McpHostClient {
    client: Client,
    base_url: String,
    guard: TransportGuard,
}

impl McpHostClient {
    pub fn new(config: &ToolHostConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &ToolHostConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            guard: TransportGuard::new(config.timeout_ms),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 列出工具宿主上的全部工具
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let url = format!("{}/tools", self.base_url);
        debug!("[McpHostClient] GET {}", url);

        let body = self
            .guard
            .send_json(self.client.get(&url))
            .await
            .map_err(to_tool_error)?;
        let list: ToolListResponse = serde_json::from_value(body)
            .map_err(|e| ToolError::ExecutionFailed(format!("工具列表格式错误: {e}")))?;

        info!("[McpHostClient] 获取到 {} 个工具", list.tools.len());
        Ok(list.tools)
    }

    fn call_url(&self, tool_name: &str) -> String {
        format!(
            "{}/tools/{}/call",
            self.base_url,
            urlencoding::encode(tool_name)
        )
    }
}

#[async_trait]
impl ToolExecutor for McpHostClient {
    async fn invoke(
        &self,
        owner_ref: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value, ToolError> {
        let url = self.call_url(tool_name);
        debug!("[McpHostClient] POST {} server={}", url, owner_ref);

        let request = self.client.post(&url).json(&json!({
            "server_name": owner_ref,
            "arguments": arguments,
        }));
        self.guard.send_json(request).await.map_err(to_tool_error)
    }
}

/// 宿主返回的错误（含 `detail`）属于执行失败，其余属于通信失败
fn to_tool_error(err: LlmError) -> ToolError {
    match err {
        LlmError::ProviderError { message, .. } => ToolError::ExecutionFailed(message),
        LlmError::Timeout { timeout_ms } => {
            ToolError::Transport(format!("工具宿主调用超时（{timeout_ms}ms）"))
        }
        other => ToolError::Transport(other.to_string()),
    }
}
