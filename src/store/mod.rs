pub mod memory;
pub mod postgres;

use crate::domain::models::{
    AppFeedback, Assignment, EmployeeClass, NewAppFeedback, NewSubmission, Submission, User,
};
use crate::error::ReviewError;
use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence seam for the review workflow.
///
/// Implementations convert their own transport errors into
/// `ReviewError::CollaboratorUnavailable` and enforce the uniqueness rules themselves:
/// one assignment per (reviewer, reviewee, class), one submission per
/// (reviewer, reviewee), one app feedback per user.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<(), ReviewError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ReviewError>;
    async fn find_user_by_login(&self, login_handle: &str) -> Result<Option<User>, ReviewError>;
    async fn list_users(&self) -> Result<Vec<User>, ReviewError>;
    async fn delete_user(&self, id: Uuid) -> Result<(), ReviewError>;

    async fn question_list(&self, class: EmployeeClass) -> Result<Vec<String>, ReviewError>;
    async fn replace_question_list(
        &self,
        class: EmployeeClass,
        questions: &[String],
    ) -> Result<(), ReviewError>;

    /// Fails with `DuplicateAssignment` when the triple already exists.
    async fn insert_assignment(
        &self,
        reviewer_id: Uuid,
        reviewee_id: Uuid,
        class: EmployeeClass,
    ) -> Result<Assignment, ReviewError>;
    async fn list_assignments(&self, class: EmployeeClass) -> Result<Vec<Assignment>, ReviewError>;
    async fn assignments_for_reviewer(
        &self,
        reviewer_id: Uuid,
    ) -> Result<Vec<Assignment>, ReviewError>;
    /// Deleting an unknown id is not an error.
    async fn delete_assignment(&self, id: Uuid) -> Result<(), ReviewError>;

    /// Atomic check-and-insert; fails with `AlreadyReviewed` when the pair exists.
    async fn insert_submission(&self, submission: NewSubmission) -> Result<Submission, ReviewError>;
    async fn reviewed_reviewees(&self, reviewer_id: Uuid) -> Result<HashSet<Uuid>, ReviewError>;
    async fn submissions_for_reviewee(
        &self,
        reviewee_id: Uuid,
    ) -> Result<Vec<Submission>, ReviewError>;
    async fn all_submissions(&self) -> Result<Vec<Submission>, ReviewError>;

    /// Writes the feedback and sets the user's one-time flag in one atomic unit.
    async fn record_app_feedback(
        &self,
        feedback: NewAppFeedback,
    ) -> Result<AppFeedback, ReviewError>;
    async fn list_app_feedback(&self) -> Result<Vec<AppFeedback>, ReviewError>;
}
