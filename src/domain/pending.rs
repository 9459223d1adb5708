use crate::domain::directory::Directory;
use crate::domain::ledger::assigned_reviewees_for;
use crate::domain::models::EmployeeClass;
use crate::domain::submissions::reviewed_pairs_for;
use crate::error::ReviewError;
use crate::store::ReviewStore;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PendingReview {
    pub reviewee_id: Uuid,
    pub display_name: String,
    pub class: EmployeeClass,
}

/// Assigned reviewees the reviewer has not yet submitted for, sorted by name.
/// Reviewees whose user record is gone are left out.
pub async fn pending_reviews(
    store: &dyn ReviewStore,
    reviewer_id: Uuid,
) -> Result<Vec<PendingReview>, ReviewError> {
    let assigned = assigned_reviewees_for(store, reviewer_id).await?;
    if assigned.is_empty() {
        return Ok(Vec::new());
    }
    let reviewed = reviewed_pairs_for(store, reviewer_id).await?;
    let directory = Directory::load(store).await?;

    let mut pending: Vec<PendingReview> = assigned
        .difference(&reviewed)
        .filter_map(|id| {
            let user = directory.get(*id);
            if user.is_none() {
                tracing::debug!("Skipping pending reviewee {} without user record", id);
            }
            user
        })
        .map(|user| PendingReview {
            reviewee_id: user.id,
            display_name: user.display_name.clone(),
            class: user.class,
        })
        .collect();
    pending.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then(a.reviewee_id.cmp(&b.reviewee_id))
    });
    Ok(pending)
}
