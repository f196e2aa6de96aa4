//! HTTP-level behaviour of the chat provider against a mock server.

use std::time::Duration;

use llm::{ChatProvider, ChatProviderConfig};
use pipeline::{ChatMessage, CompletionRequest, LlmError, LlmProvider, ModelName, ResponseFormat};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider(server: &MockServer) -> ChatProvider {
    ChatProvider::new(ChatProviderConfig {
        api_key: "test-key".into(),
        base_url: format!("{}/openai/v1", server.uri()),
        request_timeout: Duration::from_secs(5),
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    })
    .unwrap()
}

fn request(format: ResponseFormat) -> CompletionRequest {
    CompletionRequest {
        model: ModelName::new("llama-3.1-8b-instant").unwrap(),
        messages: vec![ChatMessage::system("You plan."), ChatMessage::user("Plan an outline.")],
        temperature: 0.1,
        max_tokens: 256,
        response_format: format,
    }
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
    })
}

#[tokio::test]
async fn sends_bearer_auth_and_json_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "llama-3.1-8b-instant",
            "response_format": {"type": "json_object"},
            "messages": [{"role": "system", "content": "You plan."}, {"role": "user", "content": "Plan an outline."}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(r#"{"title": "T"}"#)))
        .expect(1)
        .mount(&server)
        .await;

    let completion = provider(&server).complete(&request(ResponseFormat::JsonObject)).await.unwrap();

    assert_eq!(completion.content, r#"{"title": "T"}"#);
    assert_eq!(completion.usage.prompt_tokens.as_u64(), 12);
    assert_eq!(completion.usage.total().as_u64(), 19);
}

#[tokio::test]
async fn rate_limit_is_retried_after_the_server_delay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("hello")))
        .expect(1)
        .mount(&server)
        .await;

    let completion = provider(&server).complete(&request(ResponseFormat::Text)).await.unwrap();

    assert_eq!(completion.content, "hello");
}

#[tokio::test]
async fn server_errors_exhaust_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("over capacity"))
        .expect(3)
        .mount(&server)
        .await;

    let error = provider(&server).complete(&request(ResponseFormat::Text)).await.unwrap_err();

    assert!(matches!(error, LlmError::Transient { .. }), "{error}");
    assert!(error.to_string().contains("503"));
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "Invalid API Key", "type": "invalid_request_error"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let error = provider(&server).complete(&request(ResponseFormat::Text)).await.unwrap_err();

    assert_eq!(
        error,
        LlmError::Permanent {
            status: 401,
            message: "Invalid API Key".into()
        }
    );
}

#[tokio::test]
async fn missing_choices_is_an_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let error = provider(&server).complete(&request(ResponseFormat::Text)).await.unwrap_err();

    assert_eq!(error, LlmError::EmptyResponse);
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let error = provider(&server).complete(&request(ResponseFormat::Text)).await.unwrap_err();

    assert!(matches!(error, LlmError::Decode { .. }));
}
