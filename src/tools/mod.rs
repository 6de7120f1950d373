//! 工具模块
//!
//! - `dispatcher`: 把工具调用转换为工具结果消息
//! - `mcp_host`: 本地工具宿主 HTTP 客户端
//! - `registry`: 进程内工具注册表

mod dispatcher;
mod mcp_host;
mod registry;
mod types;

pub use dispatcher::{error_content, ToolDispatcher, UNKNOWN_TOOL_REASON};
pub use mcp_host::McpHostClient;
pub use registry::ToolRegistry;
pub use types::{Tool, ToolError, ToolExecutor, ToolValidationError};
