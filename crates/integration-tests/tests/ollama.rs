mod harness;

use harness::config::ConfigBuilder;
use harness::mock_vendor::{self, MockVendor, Mode};
use harness::server::TestServer;
use serde_json::{Value, json};

fn chat_body(stream: bool, include_usage: bool) -> Value {
    json!({
        "model": "gpt-4o-mini",
        "messages": [{"role": "user", "content": "Hello!"}],
        "stream": stream,
        "stream_options": {"include_usage": include_usage}
    })
}

fn ndjson(text: &str) -> Vec<Value> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect()
}

fn message_content(lines: &[Value]) -> String {
    lines
        .iter()
        .filter_map(|line| line["message"]["content"].as_str())
        .collect()
}

#[tokio::test]
async fn liveness_text_and_wrong_path_key() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server.client().get(server.ollama_url("")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Ollama is running");

    let resp = server
        .client()
        .get(server.url("/ollama/xxx/v1/api/tags"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(resp.text().await.unwrap(), r#"{"error":"Unauthorized"}"#);
}

#[tokio::test]
async fn path_key_is_rejected_when_no_secret_is_configured() {
    let server = TestServer::start(ConfigBuilder::new().with_api_key(None).build())
        .await
        .unwrap();

    let resp = server.client().get(server.ollama_url("/api/tags")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn tags_match_the_model_listing() {
    let mock = MockVendor::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_openai(&mock).with_cohere(&mock).build())
        .await
        .unwrap();

    let tags: Value = server
        .client()
        .get(server.ollama_url("/api/tags"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = tags["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|model| model["name"].as_str().unwrap())
        .collect();

    let listing = server.models().await;
    let ids: Vec<&str> = listing["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|card| card["id"].as_str().unwrap())
        .collect();

    assert_eq!(names, ids);
    assert!(names.contains(&"gpt-4o-mini"));
    assert!(names.contains(&"command-r"));
}

#[tokio::test]
async fn non_streaming_reply_is_a_single_done_object() {
    let mock = MockVendor::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_openai(&mock).build())
        .await
        .unwrap();

    let resp = server.ollama_chat(&chat_body(false, false)).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    assert_eq!(body["message"]["role"], "assistant");
    assert_eq!(body["message"]["content"], mock_vendor::full_text());
    assert_eq!(body["done"], true);
    assert_eq!(body["done_reason"], "stop");
    assert_eq!(body["prompt_eval_count"], mock_vendor::PROMPT_TOKENS);
    assert_eq!(body["eval_count"], mock_vendor::COMPLETION_TOKENS);
    assert!(body["created_at"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn ollama_only_fields_are_not_forwarded() {
    let mock = MockVendor::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_openai(&mock).build())
        .await
        .unwrap();

    let mut body = chat_body(false, false);
    body["options"] = json!({"num_ctx": 4096});
    body["keep_alive"] = json!("5m");

    assert_eq!(server.ollama_chat(&body).await.status(), 200);
    let sent = mock.last_body().unwrap();
    assert!(sent.get("options").is_none());
    assert!(sent.get("keep_alive").is_none());
}

#[tokio::test]
async fn streamed_lines_end_with_one_done_line_carrying_counts() {
    let mock = MockVendor::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_openai(&mock).build())
        .await
        .unwrap();

    let resp = server.ollama_chat(&chat_body(true, true)).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("application/x-ndjson")
    );
    let lines = ndjson(&resp.text().await.unwrap());

    let (last, rest) = lines.split_last().unwrap();
    assert!(rest.iter().all(|line| line["done"] == false));
    assert_eq!(last["done"], true);
    assert_eq!(last["done_reason"], "stop");
    assert_eq!(last["prompt_eval_count"], mock_vendor::PROMPT_TOKENS);
    assert_eq!(last["eval_count"], mock_vendor::COMPLETION_TOKENS);
    assert_eq!(message_content(&lines), mock_vendor::full_text());
}

#[tokio::test]
async fn streamed_done_line_without_usage_has_no_counts() {
    let mock = MockVendor::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_openai(&mock).build())
        .await
        .unwrap();

    let lines = ndjson(&server.ollama_chat(&chat_body(true, false)).await.text().await.unwrap());
    let last = lines.last().unwrap();

    assert_eq!(last["done"], true);
    assert!(last.get("eval_count").is_none());
    assert_eq!(message_content(&lines), mock_vendor::full_text());
}

#[tokio::test]
async fn mid_stream_failure_ends_with_error_line() {
    let mock = MockVendor::start_with(Mode::BreakAfter(2)).await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_openai(&mock).build())
        .await
        .unwrap();

    let lines = ndjson(&server.ollama_chat(&chat_body(true, true)).await.text().await.unwrap());

    let (last, rest) = lines.split_last().unwrap();
    assert!(last["error"].is_string(), "expected an error line, got {last}");
    assert_eq!(message_content(rest), "Hello from");
    assert!(rest.iter().all(|line| line["done"] == false));
}

#[tokio::test]
async fn unknown_model_is_rejected() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .ollama_chat(&json!({"model": "llama-9000", "messages": [{"role": "user", "content": "hi"}]}))
        .await;
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"error": "Model llama-9000 not supported"}));
}
