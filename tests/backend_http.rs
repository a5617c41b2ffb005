use ai_shorts_pipeline::api::{
    BackendClient, ConfigAction, ConfigObject, ConfigScope, ConfigStoreApi, GenerationApi,
};
use ai_shorts_pipeline::settings::SettingsStore;
use ai_shorts_pipeline::{ApiError, GenerationError, GenerationRequest, Orchestrator};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> BackendClient {
    BackendClient::with_client(reqwest::Client::new(), &format!("{}/api", server.uri()))
}

async fn mount_ok(server: &MockServer, endpoint: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/api/{endpoint}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_pipeline_over_http_resolves_relative_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate-script"))
        .and(body_partial_json(json!({
            "mothership": "m",
            "prompt": "p",
            "genre": "military",
            "agent": "medium",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": {"script": "..."}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    for endpoint in ["parse-script", "create-speech", "merge-videos", "add-captions", "add-music"] {
        mount_ok(&server, endpoint).await;
    }
    Mock::given(method("POST"))
        .and(path("/api/get-video-url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"video_url": "/videos/final.mp4", "title": "Generated Video"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut orch = Orchestrator::new(
        client_for(&server),
        GenerationRequest::new("m", "p"),
        "https://app.test",
    );
    let url = orch.run().await.unwrap();

    assert_eq!(url.as_deref(), Some("https://app.test/videos/final.mp4"));
}

#[tokio::test]
async fn non_2xx_is_a_transport_failure_with_server_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate-script"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"success": true, "error": "Missing required fields"})),
        )
        .mount(&server)
        .await;

    let mut orch = Orchestrator::new(
        client_for(&server),
        GenerationRequest::new("m", "p"),
        "https://app.test",
    );
    let err = orch.run().await.unwrap_err();

    match err {
        GenerationError::Transport { step, message } => {
            assert_eq!(step, "Generate Script");
            assert!(message.contains("Missing required fields"), "{message}");
            assert!(message.contains("400"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/parse-script"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .post_step("parse-script", json!({"session_id": "s"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn success_false_with_200_is_reported_as_step_failure() {
    let server = MockServer::start().await;
    mount_ok(&server, "generate-script").await;
    Mock::given(method("POST"))
        .and(path("/api/parse-script"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "error": "script not found"})),
        )
        .mount(&server)
        .await;

    let mut orch = Orchestrator::new(
        client_for(&server),
        GenerationRequest::new("m", "p"),
        "https://app.test",
    );
    let err = orch.run().await.unwrap_err();
    assert_eq!(err.to_string(), "Error in Parse Script: script not found");
}

#[tokio::test]
async fn config_calls_carry_object_scope_in_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config"))
        .and(query_param("object", "voice"))
        .and(query_param("action", "get"))
        .and(query_param("genre", "sci-fi"))
        .and(query_param("agent", "large"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "ok",
            "data": {"voice_id": "abc", "speed": 1.0, "pitch": 0.5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client_for(&server)
        .config_call(
            ConfigObject::Voice,
            ConfigAction::Get,
            &ConfigScope::new("sci-fi", "large"),
            json!({}),
        )
        .await
        .unwrap();
    assert!(resp.success);
    assert_eq!(resp.data["voice_id"], "abc");
}

#[tokio::test]
async fn settings_survive_a_backend_outage_through_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("settings.json");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config"))
        .and(query_param("object", "user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "last_used_mothership": "You narrate military history.",
                "last_used_prompt": "Operation Market Garden",
                "last_used_genre": "military"
            }
        })))
        .mount(&server)
        .await;

    let online = SettingsStore::new(client_for(&server), ConfigScope::default(), &cache);
    let user = online.user().await.unwrap();
    assert_eq!(user.last_used_prompt, "Operation Market Garden");

    let down = BackendClient::with_client(reqwest::Client::new(), "http://127.0.0.1:1/api");
    let offline = SettingsStore::new(down, ConfigScope::default(), &cache);
    let seeded = offline.user().await.unwrap();
    assert_eq!(seeded, user);
}

#[tokio::test]
async fn settings_with_null_or_missing_data_read_as_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config"))
        .and(query_param("object", "voice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/config"))
        .and(query_param("object", "music"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"url": null, "volume": 0.3, "start_time": null}
        })))
        .mount(&server)
        .await;

    let store = SettingsStore::new(
        client_for(&server),
        ConfigScope::default(),
        dir.path().join("settings.json"),
    );
    let voice = store.voice().await.unwrap();
    assert_eq!(voice.voice_id, "");
    let music = store.music().await.unwrap();
    assert_eq!(music.url, "");
    assert_eq!(music.volume, 0.3);
}
