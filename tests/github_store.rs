use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use url::Url;

use pagesmith::application::repos::{
    ContentStore, CreateRepository, HostingActivation, PutContent, StoreError,
};
use pagesmith::config::Secret;
use pagesmith::infra::github::GitHubContentStore;

fn store(server: &MockServer) -> GitHubContentStore {
    let base = Url::parse(&server.base_url()).expect("base url");
    GitHubContentStore::with_base(
        base,
        "octo".to_string(),
        Secret::new("ghp_token"),
        Duration::from_secs(5),
    )
    .expect("client")
}

#[tokio::test]
async fn create_repository_posts_public_repo_request() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/user/repos")
                .header("authorization", "Bearer ghp_token")
                .header("accept", "application/vnd.github+json")
                .json_body_includes(r#"{"name":"calc_abcdef12","private":false,"auto_init":false}"#);
            then.status(201).json_body(json!({
                "name": "calc_abcdef12",
                "full_name": "octo/calc_abcdef12",
                "html_url": "https://github.com/octo/calc_abcdef12"
            }));
        })
        .await;

    let outcome = store(&server)
        .create_repository("calc_abcdef12")
        .await
        .expect("created");

    mock.assert_async().await;
    match outcome {
        CreateRepository::Created(handle) => {
            assert_eq!(handle.full_name, "octo/calc_abcdef12");
            assert_eq!(handle.html_url, "https://github.com/octo/calc_abcdef12");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn create_repository_maps_unprocessable_to_already_exists() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/user/repos");
            then.status(422)
                .json_body(json!({"message": "Repository creation failed."}));
        })
        .await;

    let outcome = store(&server)
        .create_repository("calc_abcdef12")
        .await
        .expect("conflict tolerated");
    assert_eq!(outcome, CreateRepository::AlreadyExists);
}

#[tokio::test]
async fn create_repository_surfaces_other_failures_with_status_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/user/repos");
            then.status(401).body("Bad credentials");
        })
        .await;

    let err = store(&server)
        .create_repository("calc_abcdef12")
        .await
        .expect_err("unauthorized");
    match err {
        StoreError::Status { status, body, .. } => {
            assert_eq!(status, 401);
            assert_eq!(body, "Bad credentials");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn get_content_reads_branch_and_treats_not_found_as_absent() {
    let server = MockServer::start_async().await;
    let found = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/octo/calc_abcdef12/contents/index.html")
                .query_param("ref", "main");
            then.status(200).json_body(json!({
                "content": "PGgxPkhpPC9oMT4=\n",
                "sha": "blob-1",
                "encoding": "base64"
            }));
        })
        .await;
    let missing = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/octo/calc_abcdef12/contents/README.md");
            then.status(404).json_body(json!({"message": "Not Found"}));
        })
        .await;

    let store = store(&server);
    let file = store
        .get_content("calc_abcdef12", "index.html", "main")
        .await
        .expect("read")
        .expect("present");
    assert_eq!(file.sha, "blob-1");
    assert_eq!(file.encoded_content, "PGgxPkhpPC9oMT4=\n");

    let absent = store
        .get_content("calc_abcdef12", "README.md", "main")
        .await
        .expect("read");
    assert!(absent.is_none());

    found.assert_async().await;
    missing.assert_async().await;
}

#[tokio::test]
async fn put_content_sends_sha_only_for_updates() {
    let server = MockServer::start_async().await;
    let update = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/repos/octo/calc_abcdef12/contents/index.html")
                .json_body(json!({
                    "message": "feat: Round 2 update",
                    "content": "PGgxPkhpPC9oMT4=",
                    "sha": "blob-1",
                    "branch": "main"
                }));
            then.status(200)
                .json_body(json!({"content": {"sha": "blob-2"}, "commit": {"sha": "c2"}}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/repos/octo/calc_abcdef12/contents/LICENSE")
                .json_body(json!({
                    "message": "chore: Add MIT license",
                    "content": "TUlU",
                    "branch": "main"
                }));
            then.status(201)
                .json_body(json!({"content": {"sha": "blob-3"}, "commit": {"sha": "c3"}}));
        })
        .await;

    let store = store(&server);
    let commit = store
        .put_content(
            "calc_abcdef12",
            "index.html",
            PutContent {
                message: "feat: Round 2 update",
                encoded_content: "PGgxPkhpPC9oMT4=".to_string(),
                sha: Some("blob-1"),
                branch: "main",
            },
        )
        .await
        .expect("updated");
    assert_eq!(commit, "c2");

    let commit = store
        .put_content(
            "calc_abcdef12",
            "LICENSE",
            PutContent {
                message: "chore: Add MIT license",
                encoded_content: "TUlU".to_string(),
                sha: None,
                branch: "main",
            },
        )
        .await
        .expect("created");
    assert_eq!(commit, "c3");

    update.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn enable_pages_tolerates_conflict() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/repos/octo/calc_abcdef12/pages")
                .json_body(json!({"source": {"branch": "main", "path": "/"}}));
            then.status(409)
                .json_body(json!({"message": "GitHub Pages is already enabled."}));
        })
        .await;

    let activation = store(&server)
        .enable_pages("calc_abcdef12", "main")
        .await
        .expect("conflict tolerated");
    assert_eq!(activation, HostingActivation::AlreadyEnabled);
    mock.assert_async().await;
}

#[tokio::test]
async fn branch_head_returns_commit_sha() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/octo/calc_abcdef12/commits/main");
            then.status(200)
                .json_body(json!({"sha": "deadbeef", "commit": {"message": "docs: Add README"}}));
        })
        .await;

    let sha = store(&server)
        .branch_head("calc_abcdef12", "main")
        .await
        .expect("head");
    assert_eq!(sha, "deadbeef");
}

#[tokio::test]
async fn unreadable_success_body_is_a_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/calc_abcdef12");
            then.status(200).body("not json");
        })
        .await;

    let err = store(&server)
        .fetch_repository("calc_abcdef12")
        .await
        .expect_err("decode failure");
    assert!(matches!(err, StoreError::Decode { .. }));
}
