use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Every failure the review workflow can report to a caller.
///
/// Business-rule rejections (`DuplicateAssignment`, `AlreadyReviewed`, ...) are not system
/// failures: the operation simply does not happen and the caller gets an explanation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
    #[error("this reviewer is already assigned to this reviewee")]
    DuplicateAssignment,
    #[error("a review for this colleague has already been submitted")]
    AlreadyReviewed,
    #[error("app feedback has already been submitted by this user")]
    FeedbackAlreadySubmitted,
    #[error("login handle is already in use")]
    LoginTaken,
    #[error("reviewer is not assigned to this reviewee")]
    NotAssigned,
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("missing permission")]
    Forbidden,
    #[error("{collaborator} is unavailable")]
    CollaboratorUnavailable { collaborator: &'static str },
}

impl ReviewError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ReviewError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReviewError::Validation { .. } => "validation_error",
            ReviewError::DuplicateAssignment => "duplicate_assignment",
            ReviewError::AlreadyReviewed => "already_reviewed",
            ReviewError::FeedbackAlreadySubmitted => "feedback_already_submitted",
            ReviewError::LoginTaken => "login_taken",
            ReviewError::NotAssigned => "not_assigned",
            ReviewError::NotFound { .. } => "not_found",
            ReviewError::Forbidden => "forbidden",
            ReviewError::CollaboratorUnavailable { .. } => "collaborator_unavailable",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ReviewError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ReviewError::DuplicateAssignment
            | ReviewError::AlreadyReviewed
            | ReviewError::FeedbackAlreadySubmitted
            | ReviewError::LoginTaken
            | ReviewError::NotAssigned => StatusCode::CONFLICT,
            ReviewError::NotFound { .. } => StatusCode::NOT_FOUND,
            ReviewError::Forbidden => StatusCode::FORBIDDEN,
            ReviewError::CollaboratorUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        let field = match &self {
            ReviewError::Validation { field, .. } => Some(field.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
            field,
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rules_map_to_conflict() {
        assert_eq!(ReviewError::AlreadyReviewed.status(), StatusCode::CONFLICT);
        assert_eq!(ReviewError::DuplicateAssignment.status(), StatusCode::CONFLICT);
        assert_eq!(
            ReviewError::CollaboratorUnavailable { collaborator: "store" }.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn validation_message_names_the_field() {
        let err = ReviewError::validation("comment", "must not be empty");
        assert_eq!(err.to_string(), "invalid comment: must not be empty");
        assert_eq!(err.kind(), "validation_error");
    }
}
