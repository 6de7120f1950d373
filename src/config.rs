//! 配置
//!
//! Provider 配置在一次调用内不可变；编排器与工具宿主的配置可以从 YAML 文件加载。

use crate::error::LlmError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// OpenAI 兼容接口的默认模型
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
/// Gemini 默认模型
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
/// 通义千问默认模型
pub const DEFAULT_QWEN_MODEL: &str = "qwen3-max";

/// DashScope OpenAI 兼容 chat/completions 端点
pub const QWEN_ENDPOINT: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";
/// Gemini（Generative Language API）默认 base URL
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 默认请求超时：5 分钟
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 300_000;
/// 默认最大轮次
pub const DEFAULT_MAX_TURNS: usize = 5;
/// 本地工具宿主默认地址
pub const DEFAULT_TOOL_HOST_URL: &str = "http://localhost:19880/api/v1/mcp";

/// Provider 类型
///
/// 决定使用哪种线协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI 及其兼容服务（默认）
    #[default]
    #[serde(rename = "openai", alias = "custom", alias = "openai-compatible", alias = "openai_compatible")]
    OpenAI,
    /// Gemini (generateContent 协议)
    Gemini,
    /// 通义千问 (DashScope OpenAI 兼容)
    Qwen,
}

impl ProviderKind {
    /// 从字符串解析 provider 类型，未知值按 OpenAI 兼容处理
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Self::Gemini,
            "qwen" => Self::Qwen,
            _ => Self::OpenAI,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Gemini => "gemini",
            Self::Qwen => "qwen",
        }
    }

    /// Provider 的默认模型
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => DEFAULT_OPENAI_MODEL,
            Self::Gemini => DEFAULT_GEMINI_MODEL,
            Self::Qwen => DEFAULT_QWEN_MODEL,
        }
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Provider 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider 类型
    #[serde(default, alias = "model_type")]
    pub provider_kind: ProviderKind,
    /// API Key
    #[serde(default)]
    pub api_key: String,
    /// 模型名称，为空时使用 Provider 默认模型
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// 接口地址（qwen 固定，忽略此字段）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// 请求超时（毫秒），0 表示无超时
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_kind: ProviderKind::default(),
            api_key: String::new(),
            model: None,
            endpoint: None,
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl ProviderConfig {
    pub fn new(provider_kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            provider_kind,
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// 解析实际使用的模型：显式配置（去空白、忽略空串）优先，否则使用默认模型
    pub fn resolved_model(&self) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.provider_kind.default_model())
            .to_string()
    }

    /// 去空白后的 endpoint，空串视为未配置
    pub fn trimmed_endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    pub fn trimmed_api_key(&self) -> &str {
        self.api_key.trim()
    }

    /// 检查配置是否满足调用要求
    pub fn is_configured(&self) -> bool {
        self.validate().is_ok()
    }

    /// 校验必填字段
    ///
    /// OpenAI 兼容需要 endpoint 和 api_key；Gemini 与 Qwen 只需要 api_key
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.provider_kind == ProviderKind::OpenAI && self.trimmed_endpoint().is_none() {
            return Err(LlmError::NotConfigured(format!(
                "{} 需要配置 endpoint",
                self.provider_kind.as_str()
            )));
        }
        if self.trimmed_api_key().is_empty() {
            return Err(LlmError::NotConfigured(format!(
                "{} 需要配置 api_key",
                self.provider_kind.as_str()
            )));
        }
        Ok(())
    }
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

fn default_true() -> bool {
    true
}

/// 编排器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// 最大轮次（防止工具调用死循环）
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// 是否向模型暴露工具
    #[serde(default = "default_true")]
    pub tools_enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            tools_enabled: true,
        }
    }
}

fn default_tool_host_url() -> String {
    DEFAULT_TOOL_HOST_URL.to_string()
}

fn default_tool_timeout_ms() -> u64 {
    30_000
}

/// 工具宿主配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolHostConfig {
    /// 工具宿主 base URL
    #[serde(default = "default_tool_host_url")]
    pub base_url: String,
    /// 单次工具调用超时（毫秒），0 表示无超时
    #[serde(default = "default_tool_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ToolHostConfig {
    fn default() -> Self {
        Self {
            base_url: default_tool_host_url(),
            timeout_ms: default_tool_timeout_ms(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub tool_host: ToolHostConfig,
}

impl AppConfig {
    /// 从 YAML 字符串解析
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("配置文件格式错误")
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("TOOLCAST_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.provider.api_key = key;
        }
        if let Some(model) = lookup("TOOLCAST_MODEL").filter(|v| !v.trim().is_empty()) {
            self.provider.model = Some(model);
        }
        if let Some(endpoint) = lookup("TOOLCAST_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            self.provider.endpoint = Some(endpoint);
        }
    }
}

/// 默认配置文件路径: ~/.toolcast/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toolcast")
        .join("config.yaml")
}

/// 加载配置文件；文件不存在时返回默认配置
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if !path.exists() {
        tracing::info!("[Config] 配置文件不存在，使用默认配置: {}", path.display());
        return Ok(AppConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    AppConfig::from_yaml_str(&content)
        .with_context(|| format!("解析配置文件失败: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!(ProviderKind::from_str("gemini"), ProviderKind::Gemini);
        assert_eq!(ProviderKind::from_str(" QWEN "), ProviderKind::Qwen);
        assert_eq!(ProviderKind::from_str("custom"), ProviderKind::OpenAI);
        assert_eq!(ProviderKind::from_str("unknown"), ProviderKind::OpenAI);
    }

    #[test]
    fn test_resolved_model_fallback() {
        let config = ProviderConfig::new(ProviderKind::Qwen, "abc");
        assert_eq!(config.resolved_model(), DEFAULT_QWEN_MODEL);

        let config = config.with_model("   ");
        assert_eq!(config.resolved_model(), DEFAULT_QWEN_MODEL);

        let config = ProviderConfig::new(ProviderKind::Gemini, "k").with_model(" gemini-2.0-flash ");
        assert_eq!(config.resolved_model(), "gemini-2.0-flash");

        let config = ProviderConfig::new(ProviderKind::OpenAI, "k");
        assert_eq!(config.resolved_model(), DEFAULT_OPENAI_MODEL);
    }

    #[test]
    fn test_validate_required_fields() {
        let openai = ProviderConfig::new(ProviderKind::OpenAI, "sk");
        assert!(matches!(openai.validate(), Err(LlmError::NotConfigured(_))));
        assert!(openai
            .clone()
            .with_endpoint("http://localhost/v1/chat/completions")
            .is_configured());

        let qwen = ProviderConfig::new(ProviderKind::Qwen, "  ");
        assert!(!qwen.is_configured());
        assert!(ProviderConfig::new(ProviderKind::Qwen, "abc").is_configured());
        assert!(ProviderConfig::new(ProviderKind::Gemini, "abc").is_configured());
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(ProviderConfig::default().timeout_ms, 300_000);
        let parsed: ProviderConfig =
            serde_json::from_str(r#"{"provider_kind":"gemini","api_key":"k"}"#).unwrap();
        assert_eq!(parsed.timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        assert_eq!(parsed.provider_kind, ProviderKind::Gemini);
    }

    #[test]
    fn test_model_type_alias() {
        let parsed: ProviderConfig =
            serde_json::from_str(r#"{"model_type":"custom","api_key":"k"}"#).unwrap();
        assert_eq!(parsed.provider_kind, ProviderKind::OpenAI);
    }

    #[test]
    fn test_load_config_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "provider:\n  provider_kind: qwen\n  api_key: abc\norchestrator:\n  max_turns: 3\ntool_host:\n  base_url: http://127.0.0.1:9000/api/v1/mcp"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.provider.provider_kind, ProviderKind::Qwen);
        assert_eq!(config.provider.api_key, "abc");
        assert_eq!(config.orchestrator.max_turns, 3);
        assert!(config.orchestrator.tools_enabled);
        assert_eq!(config.tool_host.base_url, "http://127.0.0.1:9000/api/v1/mcp");
        assert_eq!(config.tool_host.timeout_ms, 30_000);
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "provider: [unclosed").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TOOLCAST_API_KEY", "from-env"),
            ("TOOLCAST_MODEL", "qwen-plus"),
            ("TOOLCAST_ENDPOINT", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.provider.api_key, "from-env");
        assert_eq!(config.provider.model.as_deref(), Some("qwen-plus"));
        assert_eq!(config.provider.endpoint, None);
    }
}
