use crate::domain::ledger::assigned_reviewees_for;
use crate::domain::pending::{pending_reviews, PendingReview};
use crate::domain::questions::{question_form, QuestionForm};
use crate::domain::submissions::{reviewed_pairs_for, submit, ReviewDraft};
use crate::error::ReviewError;
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct SubmitReviewRequest {
    pub reviewee_id: Uuid,
    #[serde(flatten)]
    pub draft: ReviewDraft,
}

#[derive(Serialize)]
pub struct SubmitReviewResponse {
    pub id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct ReviewForm {
    pub reviewee_id: Uuid,
    pub reviewee_name: String,
    /// Carries the reviewee's class along with the questions.
    #[serde(flatten)]
    pub form: QuestionForm,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(submit_review))
        .route("/pending", get(pending))
        .route("/form/:reviewee_id", get(form))
        .with_state(state)
}

async fn pending(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<PendingReview>>, ReviewError> {
    Ok(Json(pending_reviews(state.store.as_ref(), user.id).await?))
}

/// The questionnaire for one outstanding review.
async fn form(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Path(reviewee_id): Path<Uuid>,
) -> Result<Json<ReviewForm>, ReviewError> {
    let store = state.store.as_ref();
    if !assigned_reviewees_for(store, user.id).await?.contains(&reviewee_id) {
        return Err(ReviewError::NotAssigned);
    }
    if reviewed_pairs_for(store, user.id).await?.contains(&reviewee_id) {
        return Err(ReviewError::AlreadyReviewed);
    }
    let reviewee = store
        .find_user(reviewee_id)
        .await?
        .ok_or(ReviewError::NotFound { entity: "reviewee" })?;

    Ok(Json(ReviewForm {
        reviewee_id,
        reviewee_name: reviewee.display_name,
        form: question_form(store, reviewee.class).await?,
    }))
}

async fn submit_review(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<SubmitReviewRequest>,
) -> Result<(StatusCode, Json<SubmitReviewResponse>), ReviewError> {
    let stored = submit(state.store.as_ref(), user.id, payload.reviewee_id, payload.draft).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitReviewResponse {
            id: stored.id,
            submitted_at: stored.submitted_at,
        }),
    ))
}
