use crate::analytics::results::{my_results, my_summary, MyResults, SummaryOutcome};
use crate::error::ReviewError;
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{extract::State, routing::get, Json, Router};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/me", get(results))
        .route("/me/summary", get(summary))
        .with_state(state)
}

async fn results(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<MyResults>, ReviewError> {
    Ok(Json(my_results(state.store.as_ref(), &user).await?))
}

async fn summary(
    UserSession(user): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<SummaryOutcome>, ReviewError> {
    let outcome = my_summary(state.store.as_ref(), state.ai.as_deref(), &user).await?;
    Ok(Json(outcome))
}
