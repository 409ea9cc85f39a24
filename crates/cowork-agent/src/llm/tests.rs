//! Tests for the LLM client.

use super::*;
use crate::test_support::ScriptedModel;
use crate::types::ChatMessage;

#[test]
fn test_detect_api_format_openai() {
    assert_eq!(
        detect_api_format("gpt-4o", "https://api.openai.com/v1"),
        ApiFormat::OpenAI
    );
    assert_eq!(
        detect_api_format("deepseek-chat", "https://api.deepseek.com/v1"),
        ApiFormat::OpenAI
    );
}

#[test]
fn test_detect_api_format_claude() {
    assert_eq!(
        detect_api_format("claude-3-5-sonnet-20241022", "https://api.anthropic.com"),
        ApiFormat::Claude
    );
    assert_eq!(
        detect_api_format("gpt-4o", "https://anthropic-proxy.example.com/v1"),
        ApiFormat::Claude
    );
}

#[test]
fn test_convert_messages_for_claude_merges_system() {
    let messages = vec![
        ChatMessage::system("You are helpful."),
        ChatMessage::system("Tools follow."),
        ChatMessage::user("Hello"),
        ChatMessage::assistant("Hi there!"),
    ];

    let (system, claude_msgs) = LlmClient::convert_messages_for_claude(&messages);

    assert_eq!(system.as_deref(), Some("You are helpful.\n\nTools follow."));
    assert_eq!(claude_msgs.len(), 2);
    assert_eq!(claude_msgs[0]["content"], "Hello");
    assert_eq!(claude_msgs[1]["content"][0]["text"], "Hi there!");
}

#[test]
fn test_images_become_content_parts() {
    let messages = vec![ChatMessage::user_with_images(
        "What is this?",
        vec![
            "https://example.com/cat.png".to_string(),
            "data:image/png;base64,iVBOR".to_string(),
        ],
    )];

    let openai = LlmClient::convert_messages_for_openai(&messages);
    let parts = openai[0]["content"].as_array().unwrap();
    assert_eq!(parts[0]["type"], "text");
    assert_eq!(parts[1]["image_url"]["url"], "https://example.com/cat.png");

    let (_, claude) = LlmClient::convert_messages_for_claude(&messages);
    let blocks = claude[0]["content"].as_array().unwrap();
    assert_eq!(blocks[0]["source"]["type"], "url");
    assert_eq!(blocks[1]["source"]["media_type"], "image/png");
    assert_eq!(blocks[1]["source"]["data"], "iVBOR");
    assert_eq!(blocks[2]["text"], "What is this?");
}

#[tokio::test]
async fn test_missing_api_key() {
    let client = LlmClient::new("https://api.openai.com/v1", "  ", "gpt-4o", 1024, None).unwrap();
    let err = client.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
    assert!(matches!(err, ModelError::MissingApiKey));
}

#[tokio::test]
async fn test_cancel_abandons_request() {
    let model = ScriptedModel::new(["never seen"]);
    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = complete_cancellable(&model, &[ChatMessage::user("hi")], &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::Cancelled));
    assert_eq!(model.request_count(), 0);
}
