mod harness;

use harness::config::ConfigBuilder;
use harness::mock_vendor::MockVendor;
use harness::server::TestServer;
use serde_json::json;
use switchboard_config::{AnyOrList, CorsConfig};

fn hello(model: &str) -> serde_json::Value {
    json!({"model": model, "messages": [{"role": "user", "content": "Hello!"}]})
}

#[tokio::test]
async fn missing_or_wrong_token_is_unauthorized_on_every_path() {
    let mock = MockVendor::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_openai(&mock).build())
        .await
        .unwrap();

    for token in [None, Some("wrong"), Some("")] {
        for (method, path) in [
            (reqwest::Method::GET, "/v1/models"),
            (reqwest::Method::POST, "/v1/chat/completions"),
            (reqwest::Method::GET, "/does/not/exist"),
        ] {
            let mut request = server.client().request(method, server.url(path)).json(&hello("gpt-4o-mini"));
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            let resp = request.send().await.unwrap();

            assert_eq!(resp.status(), 401, "{path} with {token:?}");
            let body: serde_json::Value = resp.json().await.unwrap();
            assert_eq!(body, json!({"error": "Unauthorized"}));
        }
    }

    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn no_configured_secret_rejects_every_token() {
    let server = TestServer::start(ConfigBuilder::new().with_api_key(None).build())
        .await
        .unwrap();

    let resp = server.chat(&hello("gpt-4o-mini")).await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn unknown_model_has_fixed_error_body() {
    let mock = MockVendor::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_openai(&mock).build())
        .await
        .unwrap();

    for model in ["not-a-model", "claude-3-haiku-20240307"] {
        let resp = server.chat(&hello(model)).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"error": format!("Model {model} not supported")}));
    }

    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn cors_preflight_skips_the_bearer_check() {
    let server = TestServer::start(
        ConfigBuilder::new()
            .with_cors(CorsConfig {
                origins: AnyOrList::List(vec!["https://app.example".to_owned()]),
                methods: AnyOrList::List(vec!["GET".to_owned(), "POST".to_owned()]),
                headers: AnyOrList::Any,
                max_age: Some(600),
            })
            .build(),
    )
    .await
    .unwrap();

    let resp = server
        .client()
        .request(reqwest::Method::OPTIONS, server.url("/v1/chat/completions"))
        .header("origin", "https://app.example")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "https://app.example"
    );
}
