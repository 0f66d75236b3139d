use tutor_core::domain::ChatTurn;
use tutor_core::ports::{LanguageModel, PortError};
use tutor_lib::adapters::{OpenAiChatAdapter, UnconfiguredModel};

const COMPLETION: &str = r#"{
    "id": "chatcmpl-1",
    "object": "chat.completion",
    "created": 1709283600,
    "model": "deepseek-chat",
    "choices": [{
        "index": 0,
        "message": {"role": "assistant", "content": "PART 1 - SUMMARY: A formal essay."},
        "finish_reason": "stop"
    }],
    "usage": {"prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18}
}"#;

#[tokio::test]
async fn it_returns_the_first_choice() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"model": "deepseek-chat"}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(COMPLETION)
        .create_async()
        .await;

    let adapter = OpenAiChatAdapter::connect("sk-test", &server.url(), "deepseek-chat".to_string());
    let reply = adapter
        .complete("Be brief.", &[ChatTurn::user("Analyze this.")])
        .await
        .unwrap();

    assert_eq!(reply, "PART 1 - SUMMARY: A formal essay.");
    mock.assert_async().await;
}

#[tokio::test]
async fn it_maps_api_errors_to_port_errors() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": {"message": "Invalid API key", "type": "invalid_request_error", "param": null, "code": "invalid_api_key"}}"#)
        .create_async()
        .await;

    let adapter = OpenAiChatAdapter::connect("sk-bad", &server.url(), "deepseek-chat".to_string());
    let result = adapter.complete("Be brief.", &[ChatTurn::user("Hi")]).await;

    assert!(matches!(result, Err(PortError::Unexpected(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn it_reports_missing_configuration() {
    let result = UnconfiguredModel.complete("Be brief.", &[ChatTurn::user("Hi")]).await;

    assert!(matches!(result, Err(PortError::NotConfigured(_))));
}
