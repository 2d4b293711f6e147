//! Values produced and consumed by the publish pipeline.

use std::fmt;

use pagesmith_api_types::EvaluationBody;

use super::task::{Round, TaskRequest};

/// Optimistic-concurrency marker of a stored file's current content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Durable commit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitSha(String);

impl CommitSha {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A usable reference to a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    /// Bare repository name, e.g. `calc-app_abcdef12`.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Browser URL of the repository.
    pub html_url: String,
}

/// A file the pipeline writes. Identity is `(repository, path)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    pub path: &'static str,
    pub content: String,
    pub message: &'static str,
}

impl ManagedFile {
    pub fn new(path: &'static str, content: impl Into<String>, message: &'static str) -> Self {
        Self {
            path,
            content: content.into(),
            message,
        }
    }
}

/// Decoded content of a stored file together with its version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub content: String,
    pub version: VersionToken,
}

/// Outcome of a completed publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub repository: RepositoryHandle,
    pub repo_url: String,
    pub commit_sha: CommitSha,
    pub pages_url: String,
}

/// Completion report posted to the caller's evaluation URL.
///
/// Built once per successful request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationPayload {
    email: String,
    task_id: String,
    round: Round,
    nonce: String,
    repo_url: String,
    commit_sha: CommitSha,
    pages_url: String,
}

impl EvaluationPayload {
    pub fn new(request: &TaskRequest, result: &PublishResult) -> Self {
        Self {
            email: request.email().to_string(),
            task_id: request.task_id().to_string(),
            round: request.round(),
            nonce: request.nonce().to_string(),
            repo_url: result.repo_url.clone(),
            commit_sha: result.commit_sha.clone(),
            pages_url: result.pages_url.clone(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn commit_sha(&self) -> &CommitSha {
        &self.commit_sha
    }

    pub fn to_body(&self) -> EvaluationBody {
        EvaluationBody {
            email: self.email.clone(),
            task: self.task_id.clone(),
            round: self.round.number(),
            nonce: self.nonce.clone(),
            repo_url: self.repo_url.clone(),
            commit_sha: self.commit_sha.as_str().to_string(),
            pages_url: self.pages_url.clone(),
        }
    }
}
