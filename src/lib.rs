//! toolcast
//!
//! 多 Provider 的 LLM 工具调用编排库：把一次调用扩展为
//! "请求模型 → 执行工具 → 回传结果"的多轮对话，支持 OpenAI 兼容、Gemini 和 Qwen。

pub mod config;
pub mod error;
pub mod logger;
pub mod message;
pub mod models;
pub mod orchestrator;
pub mod protocols;
pub mod resilience;
pub mod tools;

pub use config::{AppConfig, OrchestratorConfig, ProviderConfig, ProviderKind, ToolHostConfig};
pub use error::LlmError;
pub use message::{Conversation, Message, ToolCall, ToolDescriptor};
pub use orchestrator::{invoke_llm, FinishReason, InvokeRequest, InvokeResponse, Orchestrator};
pub use protocols::{create_protocol, Protocol, TurnResponse};
pub use tools::{McpHostClient, ToolDispatcher, ToolError, ToolExecutor, ToolRegistry};
