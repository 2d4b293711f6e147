use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pagesmith_api_types::ErrorResponse;

use crate::application::error::ErrorReport;
use crate::application::tasks::TaskError;

const SOURCE: &str = "infra::http::handle_task";

/// Error response carrying a `{detail}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
    report: ErrorReport,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        let (status, detail) = match &err {
            TaskError::Unauthorized => (StatusCode::FORBIDDEN, "Invalid secret".to_string()),
            TaskError::InvalidRound(_) => (StatusCode::BAD_REQUEST, "Invalid round".to_string()),
            TaskError::Invalid(inner) => (StatusCode::BAD_REQUEST, inner.to_string()),
            TaskError::Publish(inner) => (StatusCode::INTERNAL_SERVER_ERROR, inner.to_string()),
        };
        let report = ErrorReport::from_error(SOURCE, status, &err);
        Self {
            status,
            detail,
            report,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let detail = rejection.body_text();
        let report = ErrorReport::from_message(SOURCE, status, detail.clone());
        Self {
            status,
            detail,
            report,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            detail: self.detail,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::publish::PublishError;
    use crate::application::repos::StoreError;
    use crate::domain::error::DomainError;

    #[test]
    fn task_errors_map_to_status_and_detail() {
        let forbidden = ApiError::from(TaskError::Unauthorized);
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.detail(), "Invalid secret");

        let round = ApiError::from(TaskError::InvalidRound(3));
        assert_eq!(round.status(), StatusCode::BAD_REQUEST);
        assert_eq!(round.detail(), "Invalid round");

        let invalid = ApiError::from(TaskError::Invalid(DomainError::validation(
            "brief",
            "must not be empty",
        )));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert!(invalid.detail().contains("brief"));

        let upstream = ApiError::from(TaskError::Publish(PublishError::Store(
            StoreError::status("create_repository", 500, "boom"),
        )));
        assert_eq!(upstream.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(upstream.detail().contains("500"));
        assert!(upstream.detail().contains("boom"));
    }
}
