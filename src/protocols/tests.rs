//! 协议属性测试
//!
//! 使用 proptest 进行属性测试

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::LlmError;
use crate::message::{Message, ToolCall, ToolDescriptor};
use crate::protocols::{create_protocol, GeminiProtocol, Protocol};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

/// 生成工具参数对象
fn arb_arguments() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-zA-Z0-9 _\\-./]{0,16}".prop_map(Value::from),
    ];
    prop::collection::btree_map("[a-z][a-z_]{0,8}", leaf, 0..4)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>()))
}

/// 生成 (工具名, 参数) 列表
fn arb_calls() -> impl Strategy<Value = Vec<(String, Value)>> {
    prop::collection::vec(("[a-z][a-z_]{0,11}", arb_arguments()), 0..6)
}

fn openai_body(calls: &[(String, Value)]) -> Value {
    let tool_calls: Vec<Value> = calls
        .iter()
        .enumerate()
        .map(|(i, (name, args))| {
            json!({
                "id": format!("call_{i}"),
                "type": "function",
                "function": {"name": name, "arguments": args.to_string()}
            })
        })
        .collect();
    json!({"choices": [{"message": {"role": "assistant", "content": null, "tool_calls": tool_calls}}]})
}

fn gemini_body(calls: &[(String, Value)]) -> Value {
    let parts: Vec<Value> = calls
        .iter()
        .map(|(name, args)| json!({"functionCall": {"name": name, "args": args}}))
        .collect();
    json!({"candidates": [{"content": {"role": "model", "parts": parts}}]})
}

fn assert_decoded(decoded: &[ToolCall], calls: &[(String, Value)]) -> Result<(), TestCaseError> {
    prop_assert_eq!(decoded.len(), calls.len());
    for (call, (name, args)) in decoded.iter().zip(calls) {
        prop_assert_eq!(&call.name, name);
        prop_assert_eq!(&call.arguments, args);
    }
    Ok(())
}

/// 生成一段合法历史：system + user + 若干轮 (assistant 工具调用, 工具结果)
fn arb_history() -> impl Strategy<Value = Vec<Message>> {
    (
        "[a-zA-Z ]{0,20}",
        "[a-zA-Z ?]{1,20}",
        prop::collection::vec(("[a-z]{1,8}", arb_arguments()), 0..4),
    )
        .prop_map(|(system, user, rounds)| {
            let mut history = vec![Message::system(system), Message::user(user)];
            for (i, (name, args)) in rounds.into_iter().enumerate() {
                let id = format!("call_{i}");
                history.push(Message::assistant_with_tool_calls(
                    "",
                    vec![ToolCall::new(id.clone(), name.clone(), args.clone())],
                ));
                history.push(Message::tool(id, name, json!({"echo": args})));
            }
            history
        })
}

fn openai_config() -> ProviderConfig {
    ProviderConfig::new(ProviderKind::OpenAI, "sk-test").with_endpoint("http://localhost/v1/chat")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// 对于任意 N 个工具调用，OpenAI 兼容协议解码出 N 个调用，参数与线格式一致
    #[test]
    fn prop_openai_tool_call_round_trip(calls in arb_calls()) {
        let protocol = create_protocol(ProviderKind::OpenAI);
        let turn = protocol.parse_response(&openai_body(&calls)).unwrap();
        assert_decoded(&turn.tool_calls, &calls)?;
    }

    /// Qwen 与 OpenAI 使用相同解码逻辑
    #[test]
    fn prop_qwen_tool_call_round_trip(calls in arb_calls()) {
        let protocol = create_protocol(ProviderKind::Qwen);
        let turn = protocol.parse_response(&openai_body(&calls)).unwrap();
        assert_decoded(&turn.tool_calls, &calls)?;
    }

    /// 对于任意 N 个 functionCall，Gemini 协议解码出 N 个调用，且 ID 互不相同
    #[test]
    fn prop_gemini_tool_call_round_trip(calls in arb_calls()) {
        let protocol = create_protocol(ProviderKind::Gemini);
        let turn = protocol.parse_response(&gemini_body(&calls)).unwrap();
        assert_decoded(&turn.tool_calls, &calls)?;

        let mut ids: Vec<&str> = turn.tool_calls.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), calls.len());
    }

    /// 同一历史两次构建 Gemini 请求，请求体字节完全一致
    #[test]
    fn prop_gemini_build_request_is_idempotent(history in arb_history()) {
        let config = ProviderConfig::new(ProviderKind::Gemini, "k");
        let tools = vec![ToolDescriptor::new("search", "Search", "web")];

        let first = GeminiProtocol.build_request(&history, &tools, &config).unwrap();
        let second = GeminiProtocol.build_request(&history, &tools, &config).unwrap();

        prop_assert_eq!(
            serde_json::to_vec(&first.body).unwrap(),
            serde_json::to_vec(&second.body).unwrap()
        );
        prop_assert_eq!(first.url, second.url);
    }

    /// 构建请求不修改历史，且 OpenAI 消息数量与历史一致
    #[test]
    fn prop_openai_build_request_preserves_history(history in arb_history()) {
        let snapshot = history.clone();
        let spec = create_protocol(ProviderKind::OpenAI)
            .build_request(&history, &[], &openai_config())
            .unwrap();

        prop_assert_eq!(&history, &snapshot);
        prop_assert_eq!(spec.body["messages"].as_array().map(Vec::len), Some(history.len()));
    }
}

#[test]
fn test_empty_tools_omits_key_for_all_protocols() {
    let history = [Message::user("hi")];
    let cases = [
        (ProviderKind::OpenAI, openai_config()),
        (ProviderKind::Qwen, ProviderConfig::new(ProviderKind::Qwen, "abc")),
        (ProviderKind::Gemini, ProviderConfig::new(ProviderKind::Gemini, "k")),
    ];

    for (kind, config) in cases {
        let spec = create_protocol(kind)
            .build_request(&history, &[], &config)
            .unwrap();
        let body = serde_json::to_string(&spec.body).unwrap();
        assert!(!body.contains("\"tools\""), "{kind:?}: {body}");
        assert!(!body.contains("function_declarations"), "{kind:?}: {body}");
    }
}

#[test]
fn test_create_protocol_names() {
    assert_eq!(create_protocol(ProviderKind::OpenAI).name(), "OpenAIProtocol");
    assert_eq!(create_protocol(ProviderKind::Gemini).name(), "GeminiProtocol");
    assert_eq!(create_protocol(ProviderKind::Qwen).name(), "QwenProtocol");

    for kind in [ProviderKind::OpenAI, ProviderKind::Gemini, ProviderKind::Qwen] {
        assert_eq!(create_protocol(kind).kind(), kind);
    }
}

#[test]
fn test_new_call_id_is_unique() {
    let a = super::new_call_id();
    let b = super::new_call_id();
    assert!(a.starts_with("call_"));
    assert_ne!(a, b);
}

#[test]
fn test_api_error_from_body_variants() {
    let err = super::api_error_from_body(&json!({"message": "quota exceeded", "code": 429}));
    assert_eq!(err.status_code(), 429);
    assert!(err.to_string().contains("quota exceeded"));

    let err = super::api_error_from_body(&json!("plain failure"));
    assert!(err.to_string().contains("plain failure"));
}

#[test]
fn test_api_error_from_body_without_message() {
    let err = super::api_error_from_body(&json!({"code": 500, "status": "INTERNAL"}));
    assert_eq!(err, LlmError::provider(Some(500), "INTERNAL (500)"));
    assert!(!err.to_string().contains('{'));

    let err = super::api_error_from_body(&json!({"details": []}));
    assert_eq!(err, LlmError::provider(None, "Provider 返回了无法识别的错误"));
}
