//! Inbound task requests and the values derived from them.
//!
//! A [`TaskRequest`] is the validated, immutable form of the JSON posted to
//! `/handle_task`. The repository key it yields is the idempotency anchor for the
//! whole publish pipeline: the same task id and nonce always target the same
//! repository.

use std::fmt;

use pagesmith_api_types::{AttachmentPayload, TaskPayload};
use serde_json::{Map, Value};
use url::Url;

use super::error::DomainError;

const NONCE_PREFIX_CHARS: usize = 8;

/// Revision number of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Round {
    /// First submission; creates the baseline site.
    Initial,
    /// Feedback round; revises the existing site.
    Revision,
}

impl Round {
    pub fn number(self) -> u8 {
        match self {
            Round::Initial => 1,
            Round::Revision => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Round::Initial => "1",
            Round::Revision => "2",
        }
    }
}

impl TryFrom<i64> for Round {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Round::Initial),
            2 => Ok(Round::Revision),
            other => Err(DomainError::invalid_round(other)),
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Repository name derived from a task id and nonce prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryKey(String);

impl RepositoryKey {
    /// `task_id + "_" + first 8 characters of nonce`.
    ///
    /// Counts characters rather than bytes so a multi-byte nonce never splits a code point;
    /// nonces shorter than eight characters are used whole.
    pub fn derive(task_id: &str, nonce: &str) -> Self {
        let prefix: String = nonce.chars().take(NONCE_PREFIX_CHARS).collect();
        Self(format!("{task_id}_{prefix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An attachment reference (typically a `data:` URI) with its free-form metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    reference: String,
    metadata: Map<String, Value>,
}

impl Attachment {
    pub fn new(reference: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            reference: reference.into(),
            metadata,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Display name: `metadata.name` when present, otherwise the reference's last path
    /// segment, falling back to `attachment`.
    pub fn name(&self) -> String {
        if let Some(name) = self.metadata.get("name").and_then(Value::as_str) {
            let trimmed = name.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }

        if self.is_data_uri() {
            return "attachment".to_string();
        }

        self.reference
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("attachment")
            .to_string()
    }

    pub fn is_data_uri(&self) -> bool {
        self.reference.starts_with("data:")
    }

    /// MIME type declared by a `data:` URI, if any.
    pub fn media_type(&self) -> Option<&str> {
        let rest = self.reference.strip_prefix("data:")?;
        let header = rest.split(',').next()?;
        let media = header.split(';').next()?.trim();
        (!media.is_empty()).then_some(media)
    }

    pub fn is_inline_image(&self) -> bool {
        self.media_type()
            .is_some_and(|media| media.starts_with("image/"))
    }

    fn try_from_payload(payload: AttachmentPayload) -> Result<Self, DomainError> {
        let reference = payload.reference.trim();
        if reference.is_empty() {
            return Err(DomainError::validation(
                "attachments",
                "attachment reference must not be empty",
            ));
        }
        Ok(Self::new(reference, payload.metadata))
    }
}

/// Validated task request. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    email: String,
    task_id: String,
    round: Round,
    brief: String,
    checks: Vec<String>,
    evaluation_url: Url,
    attachments: Vec<Attachment>,
    nonce: String,
}

impl TaskRequest {
    /// Validate a wire payload. The shared secret is checked by the caller beforehand and
    /// is not carried any further.
    pub fn try_from_payload(payload: TaskPayload) -> Result<Self, DomainError> {
        let TaskPayload {
            email,
            secret: _,
            task_id,
            round,
            brief,
            checks,
            evaluation_url,
            attachments,
            nonce,
        } = payload;

        let round = Round::try_from(round)?;

        // Task id and nonce are echoed in the callback verbatim, so they are never trimmed.
        if task_id.is_empty() {
            return Err(DomainError::validation("task", "must not be empty"));
        }
        if let Some(bad) = task_id.chars().find(|c| !is_repository_char(*c)) {
            return Err(DomainError::validation(
                "task",
                format!("character `{bad}` is not allowed in a repository name"),
            ));
        }

        if nonce.trim().is_empty() {
            return Err(DomainError::validation("nonce", "must not be empty"));
        }
        if let Some(bad) = nonce
            .chars()
            .take(NONCE_PREFIX_CHARS)
            .find(|c| !is_repository_char(*c))
        {
            return Err(DomainError::validation(
                "nonce",
                format!("character `{bad}` is not allowed in a repository name"),
            ));
        }

        if brief.trim().is_empty() {
            return Err(DomainError::validation("brief", "must not be empty"));
        }

        let evaluation_url = parse_callback_url(&evaluation_url)?;

        let attachments = attachments
            .into_iter()
            .map(Attachment::try_from_payload)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            email,
            task_id,
            round,
            brief,
            checks,
            evaluation_url,
            attachments,
            nonce,
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn brief(&self) -> &str {
        &self.brief
    }

    pub fn checks(&self) -> &[String] {
        &self.checks
    }

    pub fn evaluation_url(&self) -> &Url {
        &self.evaluation_url
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn repository_key(&self) -> RepositoryKey {
        RepositoryKey::derive(&self.task_id, &self.nonce)
    }
}

fn is_repository_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn parse_callback_url(raw: &str) -> Result<Url, DomainError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| DomainError::validation("evaluation_url", err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(DomainError::validation(
            "evaluation_url",
            format!("unsupported scheme `{other}`"),
        )),
    }
}
