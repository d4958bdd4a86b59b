use std::time::Duration;

use pretty_assertions::assert_eq;
use relay_core::{FeedbackRequest, StageStatus, WorkflowStatus};
use relay_engine::{
    EngineSettings, FeedbackClient, HttpWorkflowClient, StatusClient, TransportFailure,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpWorkflowClient {
    HttpWorkflowClient::new(EngineSettings {
        base_url: server.uri(),
        ..EngineSettings::default()
    })
    .expect("client")
}

#[tokio::test]
async fn status_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflow/status/wf-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requestId": "wf-1",
            "workflowStatus": "waiting_response",
            "subnets": [
                {"index": 0, "toolName": "search", "status": "done", "data": "{\"message\":\"42\"}"},
                {"index": 1, "toolName": "writer", "status": "waiting_response",
                 "question": {"type": "feedback", "text": "Proceed?", "itemId": 7}}
            ]
        })))
        .mount(&server)
        .await;

    let poll = client_for(&server).fetch_status("wf-1").await.expect("status ok");
    assert_eq!(poll.request_id, "wf-1");
    assert_eq!(poll.workflow_status, WorkflowStatus::WaitingResponse);
    assert_eq!(poll.subnets.len(), 2);
    assert_eq!(poll.subnets[0].data.as_deref(), Some(r#"{"message":"42"}"#));
    assert_eq!(poll.subnets[1].status, StageStatus::WaitingResponse);
    assert_eq!(
        poll.subnets[1].question.as_ref().map(|q| q.text.as_str()),
        Some("Proceed?")
    );
}

#[tokio::test]
async fn status_http_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflow/status/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_status("missing").await.unwrap_err();
    assert_eq!(err.kind, TransportFailure::HttpStatus(404));
}

#[tokio::test]
async fn malformed_status_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflow/status/wf-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_status("wf-1").await.unwrap_err();
    assert_eq!(err.kind, TransportFailure::Decode);
}

#[tokio::test]
async fn slow_status_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflow/status/wf-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("{}"),
        )
        .mount(&server)
        .await;

    let client = HttpWorkflowClient::new(EngineSettings {
        base_url: server.uri(),
        request_timeout: Duration::from_millis(50),
        ..EngineSettings::default()
    })
    .expect("client");
    let err = client.fetch_status("wf-1").await.unwrap_err();
    assert_eq!(err.kind, TransportFailure::Timeout);
}

#[tokio::test]
async fn feedback_posts_camel_case_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/workflow/feedback"))
        .and(body_json(json!({
            "workflowId": "wf-1",
            "subnetIndex": 2,
            "question": "Proceed?",
            "answer": "yes"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let request = FeedbackRequest {
        workflow_id: "wf-1".into(),
        subnet_index: 2,
        question: "Proceed?".into(),
        answer: "yes".into(),
    };
    client_for(&server)
        .submit_feedback(&request)
        .await
        .expect("feedback accepted");
}

#[tokio::test]
async fn rejected_feedback_carries_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/workflow/feedback"))
        .respond_with(ResponseTemplate::new(409).set_body_string("question expired"))
        .mount(&server)
        .await;

    let request = FeedbackRequest {
        workflow_id: "wf-1".into(),
        subnet_index: 0,
        question: "Proceed?".into(),
        answer: "yes".into(),
    };
    let err = client_for(&server).submit_feedback(&request).await.unwrap_err();
    assert_eq!(err.kind, TransportFailure::HttpStatus(409));
    assert!(err.message.contains("question expired"));
}

#[tokio::test]
async fn invalid_base_url_fails_before_sending() {
    let client = HttpWorkflowClient::new(EngineSettings {
        base_url: "::nope::".into(),
        ..EngineSettings::default()
    })
    .expect("client");
    let err = client.fetch_status("wf-1").await.unwrap_err();
    assert_eq!(err.kind, TransportFailure::InvalidUrl);
}
