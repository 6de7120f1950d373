//! 对话编排器
//!
//! 驱动"请求模型 → 执行工具 → 再请求模型"的多轮循环：
//! 1. 用当前历史和工具目录请求一轮
//! 2. 响应不含工具调用时结束，返回文本
//! 3. 否则追加助手消息，按顺序执行工具并追加结果，进入下一轮
//!
//! 轮次上限防止工具调用死循环；达到上限不视为错误

use crate::config::{OrchestratorConfig, ProviderConfig};
use crate::error::LlmError;
use crate::message::{Conversation, HistoryError, Message, ToolDescriptor};
use crate::protocols::{create_protocol, Protocol, TurnResponse};
use crate::tools::{ToolDispatcher, ToolExecutor};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 调用请求
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub provider_config: ProviderConfig,
    pub system_prompt: Option<String>,
    pub user_prompt: Option<String>,
    /// 已有历史；提供时忽略 system_prompt / user_prompt
    pub prior_messages: Option<Vec<Message>>,
    pub tools: Vec<ToolDescriptor>,
}

impl InvokeRequest {
    pub fn new(provider_config: ProviderConfig) -> Self {
        Self {
            provider_config,
            system_prompt: None,
            user_prompt: None,
            prior_messages: None,
            tools: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = Some(prompt.into());
        self
    }

    pub fn with_prior_messages(mut self, messages: Vec<Message>) -> Self {
        self.prior_messages = Some(messages);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    /// 构建初始历史
    fn initial_history(&self) -> Result<Conversation, LlmError> {
        if let Some(messages) = &self.prior_messages {
            return Conversation::from_messages(messages.clone()).map_err(invalid_history);
        }

        let mut messages = Vec::new();
        if let Some(system) = self.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(Message::system(system));
        }
        if let Some(user) = self.user_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(Message::user(user));
        }
        if messages.is_empty() {
            return Err(LlmError::InvalidHistory(
                "没有可发送的消息：需要 prior_messages 或 system/user 提示".to_string(),
            ));
        }
        Conversation::from_messages(messages).map_err(invalid_history)
    }
}

fn invalid_history(err: HistoryError) -> LlmError {
    LlmError::InvalidHistory(err.to_string())
}

/// 结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// 模型给出了不含工具调用的回复
    Completed,
    /// 达到轮次上限时模型仍在请求工具
    TurnBudgetExhausted,
}

/// 调用结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    /// 最后一轮的助手文本（轮次耗尽时可能为空）
    pub text: String,
    pub finish_reason: FinishReason,
    /// 实际请求模型的轮次
    pub turns: usize,
    /// 已执行的工具调用数
    pub tool_calls: usize,
}

/// 对话编排器
pub struct Orchestrator {
    protocol: Box<dyn Protocol>,
    client: Client,
    dispatcher: ToolDispatcher,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        protocol: Box<dyn Protocol>,
        dispatcher: ToolDispatcher,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            protocol,
            client: Client::new(),
            dispatcher,
            config,
        }
    }

    /// 按 Provider 配置选择协议并创建编排器
    pub fn for_provider(
        provider_config: &ProviderConfig,
        executor: Arc<dyn ToolExecutor>,
        config: OrchestratorConfig,
    ) -> Self {
        Self::new(
            create_protocol(provider_config.provider_kind),
            ToolDispatcher::new(executor),
            config,
        )
    }

    /// 使用自定义 HTTP 客户端
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// 执行一次完整调用
    pub async fn run(&self, request: InvokeRequest) -> Result<InvokeResponse, LlmError> {
        let requested = request.provider_config.provider_kind;
        if requested != self.protocol.kind() {
            return Err(LlmError::NotConfigured(format!(
                "请求的 provider 为 {}，编排器使用的是 {} 协议",
                requested.as_str(),
                self.protocol.kind().as_str()
            )));
        }
        request.provider_config.validate()?;
        let mut history = request.initial_history()?;

        let tools: &[ToolDescriptor] = if self.config.tools_enabled {
            &request.tools
        } else {
            &[]
        };
        let max_turns = self.config.max_turns.max(1);
        let mut last_content = String::new();
        let mut tool_call_count = 0;

        for turn in 1..=max_turns {
            info!(
                "[Orchestrator] 第 {}/{} 轮: protocol={}, history_len={}, tools={}",
                turn,
                max_turns,
                self.protocol.name(),
                history.len(),
                tools.len()
            );

            let response = self
                .protocol
                .send_turn(&self.client, history.messages(), tools, &request.provider_config)
                .await
                .map_err(|e| {
                    error!("[Orchestrator] 第 {} 轮请求失败: {}", turn, e);
                    e
                })?;

            let TurnResponse {
                content,
                tool_calls,
                raw_assistant_message,
            } = response;

            if tool_calls.is_empty() {
                info!(
                    "[Orchestrator] 对话完成: turns={}, tool_calls={}",
                    turn, tool_call_count
                );
                return Ok(InvokeResponse {
                    text: content,
                    finish_reason: FinishReason::Completed,
                    turns: turn,
                    tool_calls: tool_call_count,
                });
            }

            last_content = content;
            history.push(raw_assistant_message).map_err(invalid_history)?;

            // 最后一轮的工具结果不会再发送给模型，不执行
            if turn == max_turns {
                break;
            }

            info!(
                "[Orchestrator] 执行 {} 个工具调用: {:?}",
                tool_calls.len(),
                tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
            );
            for result in self.dispatcher.execute_all(&tool_calls, tools).await {
                history.push(result).map_err(invalid_history)?;
            }
            tool_call_count += tool_calls.len();
        }

        warn!(
            "[Orchestrator] 达到最大轮次 {}，模型仍在请求工具，返回最后一轮文本",
            max_turns
        );
        Ok(InvokeResponse {
            text: last_content,
            finish_reason: FinishReason::TurnBudgetExhausted,
            turns: max_turns,
            tool_calls: tool_call_count,
        })
    }
}

/// 调用方入口：使用默认编排配置执行一次调用，返回最终文本
pub async fn invoke_llm(
    request: InvokeRequest,
    executor: Arc<dyn ToolExecutor>,
) -> Result<String, LlmError> {
    let orchestrator = Orchestrator::for_provider(
        &request.provider_config,
        executor,
        OrchestratorConfig::default(),
    );
    orchestrator.run(request).await.map(|response| response.text)
}
