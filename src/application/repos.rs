//! Port traits describing the external adapters the pipeline talks to.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::generator::{GenerationRequest, GeneratorError};
use crate::domain::publish::{EvaluationPayload, RepositoryHandle};
use url::Url;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("{operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} returned an unreadable body: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn status(operation: &'static str, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            operation,
            status,
            body: body.into(),
        }
    }

    pub fn transport(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            operation,
            message: err.to_string(),
        }
    }

    pub fn decode(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            operation,
            message: err.to_string(),
        }
    }
}

/// Result of asking the store to create a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateRepository {
    Created(RepositoryHandle),
    /// The name is already taken; the caller should fetch it instead.
    AlreadyExists,
}

/// Result of asking the store to turn on static hosting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostingActivation {
    Enabled,
    AlreadyEnabled,
}

/// A stored file in transport form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Base64 body, possibly wrapped across lines.
    pub encoded_content: String,
    pub sha: String,
}

/// Body of a content write in transport form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutContent<'a> {
    pub message: &'a str,
    pub encoded_content: String,
    /// Version token of the content being replaced; `None` creates the file.
    pub sha: Option<&'a str>,
    pub branch: &'a str,
}

/// Hosted repository/content/pages API with optimistic-concurrency writes.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create_repository(&self, name: &str) -> Result<CreateRepository, StoreError>;

    async fn fetch_repository(&self, name: &str) -> Result<RepositoryHandle, StoreError>;

    /// `Ok(None)` when the path does not exist on `branch`.
    async fn get_content(
        &self,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Result<Option<RemoteFile>, StoreError>;

    /// Returns the sha of the commit the write produced.
    async fn put_content(
        &self,
        repo: &str,
        path: &str,
        content: PutContent<'_>,
    ) -> Result<String, StoreError>;

    async fn enable_pages(&self, repo: &str, branch: &str)
    -> Result<HostingActivation, StoreError>;

    async fn branch_head(&self, repo: &str, branch: &str) -> Result<String, StoreError>;
}

/// Generative model turning a brief into page markup.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GeneratorError>;
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("callback request failed: {0}")]
    Transport(String),
    #[error("callback responded with status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Destination for evaluation callbacks.
#[async_trait]
pub trait EvaluationSink: Send + Sync {
    async fn deliver(&self, url: &Url, payload: &EvaluationPayload) -> Result<(), DeliveryError>;
}
