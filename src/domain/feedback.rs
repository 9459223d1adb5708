use crate::domain::models::{AppFeedback, NewAppFeedback, User};
use crate::error::ReviewError;
use crate::store::ReviewStore;

pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=4;
const MAX_SUGGESTION_CHARS: usize = 2000;

/// One-time ease-of-use rating. The feedback row and the user's flag are written
/// together by the store.
pub async fn submit_app_feedback(
    store: &dyn ReviewStore,
    user: &User,
    rating: u8,
    suggestion: Option<String>,
) -> Result<AppFeedback, ReviewError> {
    if !RATING_RANGE.contains(&rating) {
        return Err(ReviewError::validation("rating", "must be between 1 and 4"));
    }
    let suggestion = suggestion
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    if suggestion
        .as_ref()
        .is_some_and(|s| s.chars().count() > MAX_SUGGESTION_CHARS)
    {
        return Err(ReviewError::validation("suggestion", "too long"));
    }
    if user.app_feedback_submitted {
        return Err(ReviewError::FeedbackAlreadySubmitted);
    }

    let stored = store
        .record_app_feedback(NewAppFeedback {
            user_id: user.id,
            user_name: user.display_name.clone(),
            rating,
            suggestion,
        })
        .await?;
    tracing::info!("App feedback {} recorded for user {}", stored.id, user.id);
    Ok(stored)
}

pub async fn list_app_feedback(store: &dyn ReviewStore) -> Result<Vec<AppFeedback>, ReviewError> {
    let mut all = store.list_app_feedback().await?;
    all.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    Ok(all)
}
