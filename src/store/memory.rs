use super::ReviewStore;
use crate::domain::models::{
    AppFeedback, Assignment, EmployeeClass, NewAppFeedback, NewSubmission, Submission, User,
};
use crate::error::ReviewError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    questions: HashMap<EmployeeClass, Vec<String>>,
    assignments: Vec<Assignment>,
    submissions: Vec<Submission>,
    app_feedback: Vec<AppFeedback>,
}

/// Process-local store. Every write takes the single table lock, so check-and-insert
/// sequences are atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    #[cfg(test)]
    fail_feedback_flag_update: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next feedback transaction fail after the feedback row is staged but
    /// before the user's flag is set.
    #[cfg(test)]
    pub fn fail_next_feedback_flag_update(&self) {
        self.fail_feedback_flag_update.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn flag_update_fault(&self) -> bool {
        self.fail_feedback_flag_update.swap(false, Ordering::SeqCst)
    }

    #[cfg(not(test))]
    fn flag_update_fault(&self) -> bool {
        false
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), ReviewError> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.login_handle == user.login_handle)
        {
            return Err(ReviewError::LoginTaken);
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ReviewError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_login(&self, login_handle: &str) -> Result<Option<User>, ReviewError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.login_handle == login_handle)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, ReviewError> {
        let mut users: Vec<User> = self.tables.read().await.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), ReviewError> {
        self.tables.write().await.users.remove(&id);
        Ok(())
    }

    async fn question_list(&self, class: EmployeeClass) -> Result<Vec<String>, ReviewError> {
        Ok(self
            .tables
            .read()
            .await
            .questions
            .get(&class)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_question_list(
        &self,
        class: EmployeeClass,
        questions: &[String],
    ) -> Result<(), ReviewError> {
        self.tables
            .write()
            .await
            .questions
            .insert(class, questions.to_vec());
        Ok(())
    }

    async fn insert_assignment(
        &self,
        reviewer_id: Uuid,
        reviewee_id: Uuid,
        class: EmployeeClass,
    ) -> Result<Assignment, ReviewError> {
        let mut tables = self.tables.write().await;
        if tables.assignments.iter().any(|a| {
            a.reviewer_id == reviewer_id && a.reviewee_id == reviewee_id && a.class == class
        }) {
            return Err(ReviewError::DuplicateAssignment);
        }
        let assignment = Assignment {
            id: Uuid::new_v4(),
            reviewer_id,
            reviewee_id,
            class,
            created_at: Utc::now(),
        };
        tables.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn list_assignments(&self, class: EmployeeClass) -> Result<Vec<Assignment>, ReviewError> {
        Ok(self
            .tables
            .read()
            .await
            .assignments
            .iter()
            .filter(|a| a.class == class)
            .cloned()
            .collect())
    }

    async fn assignments_for_reviewer(
        &self,
        reviewer_id: Uuid,
    ) -> Result<Vec<Assignment>, ReviewError> {
        Ok(self
            .tables
            .read()
            .await
            .assignments
            .iter()
            .filter(|a| a.reviewer_id == reviewer_id)
            .cloned()
            .collect())
    }

    async fn delete_assignment(&self, id: Uuid) -> Result<(), ReviewError> {
        self.tables.write().await.assignments.retain(|a| a.id != id);
        Ok(())
    }

    async fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<Submission, ReviewError> {
        let mut tables = self.tables.write().await;
        if tables.submissions.iter().any(|s| {
            s.reviewer_id == submission.reviewer_id && s.reviewee_id == submission.reviewee_id
        }) {
            return Err(ReviewError::AlreadyReviewed);
        }
        let stored = Submission {
            id: Uuid::new_v4(),
            reviewer_id: submission.reviewer_id,
            reviewee_id: submission.reviewee_id,
            scores: submission.scores,
            comment: submission.comment,
            development_suggestion: submission.development_suggestion,
            submitted_at: Utc::now(),
        };
        tables.submissions.push(stored.clone());
        Ok(stored)
    }

    async fn reviewed_reviewees(&self, reviewer_id: Uuid) -> Result<HashSet<Uuid>, ReviewError> {
        Ok(self
            .tables
            .read()
            .await
            .submissions
            .iter()
            .filter(|s| s.reviewer_id == reviewer_id)
            .map(|s| s.reviewee_id)
            .collect())
    }

    async fn submissions_for_reviewee(
        &self,
        reviewee_id: Uuid,
    ) -> Result<Vec<Submission>, ReviewError> {
        Ok(self
            .tables
            .read()
            .await
            .submissions
            .iter()
            .filter(|s| s.reviewee_id == reviewee_id)
            .cloned()
            .collect())
    }

    async fn all_submissions(&self) -> Result<Vec<Submission>, ReviewError> {
        Ok(self.tables.read().await.submissions.clone())
    }

    async fn record_app_feedback(
        &self,
        feedback: NewAppFeedback,
    ) -> Result<AppFeedback, ReviewError> {
        let mut tables = self.tables.write().await;
        match tables.users.get(&feedback.user_id) {
            None => return Err(ReviewError::NotFound { entity: "user" }),
            Some(user) if user.app_feedback_submitted => {
                return Err(ReviewError::FeedbackAlreadySubmitted)
            }
            Some(_) => {}
        }

        // Both writes go to a staged copy that replaces the tables only on success.
        let mut staged = tables.clone();
        let stored = AppFeedback {
            id: Uuid::new_v4(),
            user_id: feedback.user_id,
            user_name: feedback.user_name,
            rating: feedback.rating,
            suggestion: feedback.suggestion,
            submitted_at: Utc::now(),
        };
        staged.app_feedback.push(stored.clone());

        if self.flag_update_fault() {
            tracing::error!("Feedback transaction aborted before flag update");
            return Err(ReviewError::CollaboratorUnavailable {
                collaborator: "document store",
            });
        }
        let user = staged
            .users
            .get_mut(&feedback.user_id)
            .ok_or(ReviewError::NotFound { entity: "user" })?;
        user.app_feedback_submitted = true;

        *tables = staged;
        Ok(stored)
    }

    async fn list_app_feedback(&self) -> Result<Vec<AppFeedback>, ReviewError> {
        Ok(self.tables.read().await.app_feedback.clone())
    }
}
