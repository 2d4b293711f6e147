//! Task intake: authorizes and validates a request, runs the publish pipeline and
//! schedules the evaluation callback.

use std::sync::Arc;

use pagesmith_api_types::TaskPayload;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::notify::NotificationDispatcher;
use crate::application::publish::{PublishError, PublishOrchestrator};
use crate::config::Secret;
use crate::domain::error::DomainError;
use crate::domain::publish::{EvaluationPayload, PublishResult};
use crate::domain::task::{Round, TaskRequest};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("shared secret does not match")]
    Unauthorized,
    #[error("round `{0}` is not supported")]
    InvalidRound(i64),
    #[error(transparent)]
    Invalid(DomainError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl From<DomainError> for TaskError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidRound { round } => Self::InvalidRound(round),
            other => Self::Invalid(other),
        }
    }
}

/// Acknowledgement for a completed publish.
#[derive(Debug, Clone)]
pub struct TaskAccepted {
    /// `owner/name` of the published repository.
    pub repo: String,
    pub result: PublishResult,
}

pub struct TaskService {
    secret: Secret,
    orchestrator: Arc<PublishOrchestrator>,
    dispatcher: NotificationDispatcher,
}

impl TaskService {
    pub fn new(
        secret: Secret,
        orchestrator: Arc<PublishOrchestrator>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            secret,
            orchestrator,
            dispatcher,
        }
    }

    /// Handle one task end to end. Nothing touches the store until the secret and round
    /// have been checked, and the callback is only queued once the pipeline succeeded.
    pub async fn handle(&self, payload: TaskPayload) -> Result<TaskAccepted, TaskError> {
        if !self.authorize(&payload.secret) {
            warn!(
                target = "pagesmith::tasks",
                task = %payload.task_id,
                "rejected task with invalid secret"
            );
            return Err(TaskError::Unauthorized);
        }

        Round::try_from(payload.round)?;
        let request = TaskRequest::try_from_payload(payload)?;

        info!(
            target = "pagesmith::tasks",
            task = request.task_id(),
            round = %request.round(),
            repo = %request.repository_key(),
            attachments = request.attachments().len(),
            "task accepted"
        );

        let result = self.orchestrator.publish(&request).await?;

        let evaluation = EvaluationPayload::new(&request, &result);
        let accepted = TaskAccepted {
            repo: result.repository.full_name.clone(),
            result,
        };
        self.dispatcher
            .dispatch(request.evaluation_url().clone(), evaluation);

        Ok(accepted)
    }

    fn authorize(&self, candidate: &str) -> bool {
        self.secret
            .expose()
            .as_bytes()
            .ct_eq(candidate.as_bytes())
            .into()
    }
}
