use crate::domain::feedback::submit_app_feedback;
use crate::error::ReviewError;
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct AppFeedbackPayload {
    pub rating: u8,
    pub suggestion: Option<String>,
}

#[derive(Serialize)]
pub struct AppFeedbackStatus {
    pub submitted: bool,
}

#[derive(Serialize)]
pub struct AppFeedbackResponse {
    pub id: Uuid,
    pub submitted_at: DateTime<Utc>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/app", get(status).post(create))
        .with_state(state)
}

async fn status(UserSession(user): UserSession) -> Json<AppFeedbackStatus> {
    Json(AppFeedbackStatus {
        submitted: user.app_feedback_submitted,
    })
}

async fn create(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<AppFeedbackPayload>,
) -> Result<(StatusCode, Json<AppFeedbackResponse>), ReviewError> {
    let stored = submit_app_feedback(
        state.store.as_ref(),
        &user,
        payload.rating,
        payload.suggestion,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(AppFeedbackResponse {
            id: stored.id,
            submitted_at: stored.submitted_at,
        }),
    ))
}
