use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lectern_ml_client::{MlClient, MlClientConfig, MlError};
use lectern_models::FrameRef;

async fn client(server: &MockServer) -> MlClient {
    MlClient::new(MlClientConfig::new(server.uri())).unwrap()
}

#[tokio::test]
async fn transcribe_returns_segments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .and(body_json(json!({"source_path": "/m/master.mp4", "t_start": 0.0, "t_end": 600.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "segments": [
                {"t_start": 0.0, "t_end": 4.5, "text": "Welcome"},
                {"t_start": 4.5, "t_end": 9.0, "text": "Today: graphs"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let segments = client(&server)
        .await
        .transcribe("/m/master.mp4", 0.0, 600.0)
        .await
        .unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].text, "Today: graphs");
}

#[tokio::test]
async fn summarize_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/summarize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"summary": "Graphs 101"})))
        .mount(&server)
        .await;

    let frames = vec![FrameRef {
        t: 12.5,
        uri: "/media/videos/v_0123abcd/frames/0/000.jpg".to_string(),
    }];
    let summary = client(&server)
        .await
        .summarize(0, 0.0, 600.0, Vec::new(), frames)
        .await
        .unwrap();
    assert_eq!(summary, "Graphs 101");
}

#[tokio::test]
async fn non_success_status_is_request_failed_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/summarize"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .summarize(0, 0.0, 600.0, Vec::new(), Vec::new())
        .await
        .unwrap_err();
    match err {
        MlError::RequestFailed(msg) => assert!(msg.contains("overloaded")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn embed_checks_vector_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": []})))
        .mount(&server)
        .await;

    let err = client(&server).await.embed_one("theorem").await.unwrap_err();
    assert!(matches!(err, MlError::InvalidResponse(_)));
}

#[tokio::test]
async fn embed_one_returns_vector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_json(json!({"texts": ["theorem"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[0.6, 0.8]]})))
        .mount(&server)
        .await;

    let v = client(&server).await.embed_one("theorem").await.unwrap();
    assert_eq!(v, vec![0.6, 0.8]);
}

#[tokio::test]
async fn malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .transcribe("/m/master.mp4", 0.0, 1.0)
        .await
        .unwrap_err();
    assert!(matches!(err, MlError::InvalidResponse(_)));
}

#[tokio::test]
async fn health_check_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "version": "1.2.0"})))
        .mount(&server)
        .await;
    assert!(client(&server).await.health_check().await.unwrap());

    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&down)
        .await;
    assert!(!client(&down).await.health_check().await.unwrap());
}
