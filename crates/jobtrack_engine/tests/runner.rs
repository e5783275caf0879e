use futures_util::StreamExt;
use jobtrack_core::{IngestScope, JobKind, JobRequest, ResourceStatus, StreamKind, TaskState};
use jobtrack_engine::{EngineConfig, JobRunner, ReqwestJobRunner, RunnerError};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn runner_for(server: &MockServer) -> ReqwestJobRunner {
    let config = EngineConfig::default().with_base_url(format!("{}/api/", server.uri()));
    ReqwestJobRunner::new(&config).expect("valid config")
}

#[tokio::test]
async fn start_posts_to_the_kind_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/T1/identify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;
    let runner = runner_for(&server).await;

    runner
        .start("T1", &JobRequest::Identify)
        .await
        .expect("accepted");
}

#[tokio::test]
async fn reingest_targets_the_single_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/T2/references/r7/reingest"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    let runner = runner_for(&server).await;

    runner
        .start(
            "T2",
            &JobRequest::Ingest {
                scope: IngestScope::Single("r7".into()),
            },
        )
        .await
        .expect("accepted");
}

#[tokio::test]
async fn populate_sends_requested_sections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/T1/generate"))
        .and(body_json(json!({ "sections": ["Intro", "Methods"] })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let runner = runner_for(&server).await;

    runner
        .start(
            "T1",
            &JobRequest::Populate {
                sections: vec!["Intro".into(), "Methods".into()],
            },
        )
        .await
        .expect("accepted");
}

#[tokio::test]
async fn error_status_and_error_body_are_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/T1/identify"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/T1/ingest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "busy" })))
        .mount(&server)
        .await;
    let runner = runner_for(&server).await;

    let err = runner.start("T1", &JobRequest::Identify).await.unwrap_err();
    assert_eq!(err, RunnerError::HttpStatus(500));

    let err = runner
        .start(
            "T1",
            &JobRequest::Ingest {
                scope: IngestScope::All,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, RunnerError::Rejected("busy".into()));
}

#[tokio::test]
async fn fetch_snapshot_decodes_the_resource() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "T1",
            "references": [{ "id": "r1", "status": "ingested" }],
            "tasks": { "ingest": "completed" }
        })))
        .mount(&server)
        .await;
    let runner = runner_for(&server).await;

    let snapshot = runner.fetch_snapshot("T1").await.expect("snapshot");

    assert_eq!(snapshot.id, "T1");
    assert_eq!(snapshot.references[0].status, ResourceStatus::Ingested);
    assert_eq!(snapshot.task(JobKind::Ingest), TaskState::Completed);
}

#[tokio::test]
async fn fetch_snapshot_reports_undecodable_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/T1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;
    let runner = runner_for(&server).await;

    let err = runner.fetch_snapshot("T1").await.unwrap_err();

    assert!(matches!(err, RunnerError::Decode(_)));
}

#[tokio::test]
async fn open_stream_yields_event_payloads_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/T1/ingest-status"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"reference_id\":\"r1\",\"status\":\"processing\"}\n\n\
             : ping\n\n\
             data: {\"reference_id\":\"r1\",\"status\":\"ingested\"}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;
    let runner = runner_for(&server).await;

    let frames: Vec<_> = runner
        .open_stream("T1", StreamKind::IngestStatus)
        .await
        .expect("stream opened")
        .collect()
        .await;

    assert_eq!(
        frames,
        vec![
            Ok("{\"reference_id\":\"r1\",\"status\":\"processing\"}".to_string()),
            Ok("{\"reference_id\":\"r1\",\"status\":\"ingested\"}".to_string()),
        ]
    );
}

#[tokio::test]
async fn invalid_base_url_is_rejected() {
    let config = EngineConfig::default().with_base_url("not a url");

    let err = ReqwestJobRunner::new(&config).unwrap_err();

    assert!(matches!(err, RunnerError::InvalidUrl(_)));
}
