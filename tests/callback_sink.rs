use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use url::Url;

use pagesmith::application::repos::{DeliveryError, EvaluationSink};
use pagesmith::domain::publish::{CommitSha, EvaluationPayload, PublishResult, RepositoryHandle};
use pagesmith::domain::task::TaskRequest;
use pagesmith::infra::notify::HttpEvaluationSink;
use pagesmith_api_types::TaskPayload;

fn payload(evaluation_url: &str) -> EvaluationPayload {
    let request = TaskRequest::try_from_payload(TaskPayload {
        email: "student@example.com".to_string(),
        secret: "s3cret".to_string(),
        task_id: "calc".to_string(),
        round: 2,
        brief: "Add dark mode".to_string(),
        checks: Vec::new(),
        evaluation_url: evaluation_url.to_string(),
        attachments: Vec::new(),
        nonce: "abcdef123456".to_string(),
    })
    .expect("valid request");
    let result = PublishResult {
        repository: RepositoryHandle {
            name: "calc_abcdef12".to_string(),
            full_name: "octo/calc_abcdef12".to_string(),
            html_url: "https://github.com/octo/calc_abcdef12".to_string(),
        },
        repo_url: "https://github.com/octo/calc_abcdef12".to_string(),
        commit_sha: CommitSha::new("c5"),
        pages_url: "https://octo.github.io/calc_abcdef12/".to_string(),
    };
    EvaluationPayload::new(&request, &result)
}

#[tokio::test]
async fn delivers_callback_body_as_json() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/notify")
                .header("content-type", "application/json")
                .json_body(json!({
                    "email": "student@example.com",
                    "task": "calc",
                    "round": 2,
                    "nonce": "abcdef123456",
                    "repo_url": "https://github.com/octo/calc_abcdef12",
                    "commit_sha": "c5",
                    "pages_url": "https://octo.github.io/calc_abcdef12/"
                }));
            then.status(200);
        })
        .await;

    let url = Url::parse(&server.url("/notify")).expect("url");
    let sink = HttpEvaluationSink::new(Duration::from_secs(5)).expect("sink");
    sink.deliver(&url, &payload(url.as_str()))
        .await
        .expect("delivered");
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_a_delivery_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/notify");
            then.status(503).body("try later");
        })
        .await;

    let url = Url::parse(&server.url("/notify")).expect("url");
    let sink = HttpEvaluationSink::new(Duration::from_secs(5)).expect("sink");
    let err = sink
        .deliver(&url, &payload(url.as_str()))
        .await
        .expect_err("failure");
    match err {
        DeliveryError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "try later");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
