//! 消息模型
//!
//! 与 Provider 无关的规范化对话表示。
//! 序列化为各家线格式的逻辑全部在 `protocols` 中，这里只有数据定义和历史约束校验。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// 工具调用
///
/// 由 Provider 适配器在模型请求执行工具时产生
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// 工具调用 ID（同一轮内唯一）
    pub id: String,
    /// 工具名称
    pub name: String,
    /// 结构化参数
    ///
    /// 线格式中的参数无法解析时，保留原始字符串（`Value::String`），
    /// 由分发器作为参数格式错误反馈给模型
    pub arguments: Value,
}

impl ToolCall {
    /// 创建新的工具调用
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// 参数是否为结构化的 JSON 对象
    pub fn has_structured_arguments(&self) -> bool {
        self.arguments.is_object()
    }

    /// 参数的字符串形式（OpenAI 线格式要求字符串）
    pub fn arguments_string(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// 工具描述
///
/// 暴露给模型的能力声明；`owner_ref` 只供分发器定位执行服务，不会发送给模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// 工具名称（在一次对话的工具目录内唯一）
    pub name: String,
    /// 工具描述
    #[serde(default)]
    pub description: String,
    /// 参数 JSON Schema
    #[serde(default, rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    /// 所属执行服务
    #[serde(default, rename = "_server_name")]
    pub owner_ref: String,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        owner_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: None,
            owner_ref: owner_ref.into(),
        }
    }

    /// 设置参数 schema
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// 参数 schema，缺省时为空对象 schema
    pub fn parameters(&self) -> Value {
        match &self.input_schema {
            Some(schema) if !schema.is_null() => schema.clone(),
            _ => serde_json::json!({ "type": "object", "properties": {} }),
        }
    }
}

/// 在工具目录中按名称查找
pub fn find_tool<'a>(catalog: &'a [ToolDescriptor], name: &str) -> Option<&'a ToolDescriptor> {
    catalog.iter().find(|t| t.name == name)
}

/// 对话消息
///
/// 按角色区分的封闭枚举：`tool_call_id` / `tool_name` 只存在于 `Tool` 变体上
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        tool_name: String,
        /// 工具结果（结构化，不做字符串化）
        content: Value,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: Value,
    ) -> Self {
        Message::Tool {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content,
        }
    }

    /// 角色名称
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::Tool { .. } => "tool",
        }
    }

    /// 文本内容；工具消息的非字符串内容会被序列化
    pub fn text(&self) -> String {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. } => content.clone(),
            Message::Tool { content, .. } => value_to_text(content),
        }
    }

    /// 助手消息携带的工具调用
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// 把工具结果转换为文本：字符串原样返回，其它值序列化为 JSON
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 历史约束错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryError {
    /// 工具消息引用了未出现过的调用 ID
    #[error("工具消息引用了未知的 tool_call_id: {0}")]
    UnknownToolCallId(String),

    /// 助手消息中的工具调用 ID 为空
    #[error("工具调用 ID 不能为空 (tool: {0})")]
    EmptyToolCallId(String),
}

/// 只追加的对话历史
///
/// 追加时校验：每条工具消息的 `tool_call_id` 必须已在之前的助手消息中出现
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    issued_call_ids: HashSet<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已有消息构建，逐条校验
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, HistoryError> {
        let mut conversation = Self::new();
        for message in messages {
            conversation.push(message)?;
        }
        Ok(conversation)
    }

    /// 追加消息
    pub fn push(&mut self, message: Message) -> Result<(), HistoryError> {
        match &message {
            Message::Assistant { tool_calls, .. } => {
                for call in tool_calls {
                    if call.id.is_empty() {
                        return Err(HistoryError::EmptyToolCallId(call.name.clone()));
                    }
                }
                self.issued_call_ids
                    .extend(tool_calls.iter().map(|c| c.id.clone()));
            }
            Message::Tool { tool_call_id, .. } => {
                if !self.issued_call_ids.contains(tool_call_id) {
                    return Err(HistoryError::UnknownToolCallId(tool_call_id.clone()));
                }
            }
            _ => {}
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// 校验一段历史是否满足工具消息约束
pub fn validate_history(messages: &[Message]) -> Result<(), HistoryError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for message in messages {
        match message {
            Message::Assistant { tool_calls, .. } => {
                for call in tool_calls {
                    if call.id.is_empty() {
                        return Err(HistoryError::EmptyToolCallId(call.name.clone()));
                    }
                    seen.insert(call.id.as_str());
                }
            }
            Message::Tool { tool_call_id, .. } => {
                if !seen.contains(tool_call_id.as_str()) {
                    return Err(HistoryError::UnknownToolCallId(tool_call_id.clone()));
                }
            }
            _ => {}
        }
    }
    Ok(())
}
