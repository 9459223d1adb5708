use crate::domain::directory::Directory;
use crate::domain::models::{Assignment, AssignmentView, EmployeeClass};
use crate::error::ReviewError;
use crate::store::ReviewStore;
use std::collections::HashSet;
use uuid::Uuid;

pub async fn add_assignment(
    store: &dyn ReviewStore,
    reviewer_id: Uuid,
    reviewee_id: Uuid,
    class: EmployeeClass,
) -> Result<Assignment, ReviewError> {
    if reviewer_id == reviewee_id {
        return Err(ReviewError::validation(
            "reviewee_id",
            "reviewer and reviewee must be different people",
        ));
    }

    if store.find_user(reviewer_id).await?.is_none() {
        return Err(ReviewError::NotFound { entity: "reviewer" });
    }
    let reviewee = store
        .find_user(reviewee_id)
        .await?
        .ok_or(ReviewError::NotFound { entity: "reviewee" })?;
    if reviewee.class != class {
        return Err(ReviewError::validation(
            "class",
            format!("reviewee is {}, not {}", reviewee.class.as_str(), class.as_str()),
        ));
    }

    match store.insert_assignment(reviewer_id, reviewee_id, class).await {
        Ok(assignment) => {
            tracing::info!(
                "Assignment {} added: {} -> {} ({})",
                assignment.id,
                reviewer_id,
                reviewee_id,
                class.as_str()
            );
            Ok(assignment)
        }
        Err(ReviewError::DuplicateAssignment) => {
            tracing::warn!(
                "Duplicate assignment {} -> {} ({}) ignored",
                reviewer_id,
                reviewee_id,
                class.as_str()
            );
            Err(ReviewError::DuplicateAssignment)
        }
        Err(err) => Err(err),
    }
}

/// All edges of a class with names resolved; deleted users show as a placeholder.
pub async fn list_assignments(
    store: &dyn ReviewStore,
    class: EmployeeClass,
) -> Result<Vec<AssignmentView>, ReviewError> {
    let assignments = store.list_assignments(class).await?;
    let directory = Directory::load(store).await?;
    Ok(assignments
        .into_iter()
        .map(|a| AssignmentView {
            id: a.id,
            reviewer_id: a.reviewer_id,
            reviewer_name: directory.name_of(a.reviewer_id),
            reviewee_id: a.reviewee_id,
            reviewee_name: directory.name_of(a.reviewee_id),
            class: a.class,
        })
        .collect())
}

pub async fn remove_assignment(
    store: &dyn ReviewStore,
    assignment_id: Uuid,
) -> Result<(), ReviewError> {
    store.delete_assignment(assignment_id).await?;
    tracing::info!("Assignment {} removed", assignment_id);
    Ok(())
}

pub async fn assigned_reviewees_for(
    store: &dyn ReviewStore,
    reviewer_id: Uuid,
) -> Result<HashSet<Uuid>, ReviewError> {
    Ok(store
        .assignments_for_reviewer(reviewer_id)
        .await?
        .into_iter()
        .map(|a| a.reviewee_id)
        .collect())
}
