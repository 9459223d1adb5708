use super::ReviewStore;
use crate::crypto::{CryptoError, FieldCipher};
use crate::domain::models::{
    AppFeedback, Assignment, EmployeeClass, NewAppFeedback, NewSubmission, SalariedProfile,
    ScoreEntry, Submission, User, UserRole,
};
use crate::error::ReviewError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

const COLLABORATOR: &str = "document store";

fn unavailable(err: sqlx::Error) -> ReviewError {
    tracing::error!("Store query failed: {}", err);
    ReviewError::CollaboratorUnavailable {
        collaborator: COLLABORATOR,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    display_name: String,
    login_handle: String,
    employee_class: EmployeeClass,
    role: UserRole,
    employee_id: String,
    job_position: String,
    organization: Option<String>,
    job_level: Option<String>,
    app_feedback_submitted: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let salaried_profile = match (row.organization, row.job_level) {
            (Some(organization), Some(job_level)) => Some(SalariedProfile {
                organization,
                job_level,
            }),
            _ => None,
        };
        User {
            id: row.id,
            display_name: row.display_name,
            login_handle: row.login_handle,
            class: row.employee_class,
            role: row.role,
            employee_id: row.employee_id,
            job_position: row.job_position,
            salaried_profile,
            app_feedback_submitted: row.app_feedback_submitted,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: Uuid,
    reviewer_id: Uuid,
    reviewee_id: Uuid,
    employee_class: EmployeeClass,
    created_at: DateTime<Utc>,
}

impl From<AssignmentRow> for Assignment {
    fn from(row: AssignmentRow) -> Self {
        Assignment {
            id: row.id,
            reviewer_id: row.reviewer_id,
            reviewee_id: row.reviewee_id,
            class: row.employee_class,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: Uuid,
    reviewer_id: Uuid,
    reviewee_id: Uuid,
    scores: Json<Vec<ScoreEntry>>,
    enc_comment: String,
    enc_development_suggestion: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FeedbackRow {
    id: Uuid,
    user_id: Uuid,
    user_name: String,
    ease_of_use_rating: i16,
    enc_suggestion: Option<String>,
    created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = r#"
    id,
    display_name,
    login_handle,
    employee_class,
    role,
    employee_id,
    job_position,
    organization,
    job_level,
    app_feedback_submitted,
    created_at
"#;

const REVIEW_COLUMNS: &str = r#"
    id,
    reviewer_id,
    reviewee_id,
    scores,
    enc_comment,
    enc_development_suggestion,
    created_at
"#;

/// Postgres-backed store. Free-text review fields are sealed with AES-GCM before they
/// are written.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    cipher: Arc<FieldCipher>,
}

impl PgStore {
    pub fn new(pool: PgPool, cipher: Arc<FieldCipher>) -> Self {
        Self { pool, cipher }
    }

    fn open_review(&self, row: ReviewRow) -> Result<Submission, ReviewError> {
        let sealed = |e: CryptoError| {
            tracing::error!("Failed to open sealed review {}: {}", row.id, e);
            ReviewError::CollaboratorUnavailable {
                collaborator: COLLABORATOR,
            }
        };
        let comment = self.cipher.open(&row.enc_comment).map_err(sealed)?;
        let development_suggestion = self
            .cipher
            .open_opt(row.enc_development_suggestion.as_deref())
            .map_err(sealed)?;
        Ok(Submission {
            id: row.id,
            reviewer_id: row.reviewer_id,
            reviewee_id: row.reviewee_id,
            scores: row.scores.0,
            comment,
            development_suggestion,
            submitted_at: row.created_at,
        })
    }

    fn open_reviews(&self, rows: Vec<ReviewRow>) -> Result<Vec<Submission>, ReviewError> {
        rows.into_iter().map(|row| self.open_review(row)).collect()
    }

    fn seal(&self, value: Option<&str>) -> Result<Option<String>, ReviewError> {
        self.cipher.seal_opt(value).map_err(|e| {
            tracing::error!("Failed to seal review text: {}", e);
            ReviewError::CollaboratorUnavailable {
                collaborator: COLLABORATOR,
            }
        })
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn insert_user(&self, user: &User) -> Result<(), ReviewError> {
        let (organization, job_level) = match &user.salaried_profile {
            Some(p) => (Some(p.organization.as_str()), Some(p.job_level.as_str())),
            None => (None, None),
        };
        sqlx::query(
            r#"
            INSERT INTO users (
                id, display_name, login_handle, employee_class, role,
                employee_id, job_position, organization, job_level,
                app_feedback_submitted, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id)
        .bind(&user.display_name)
        .bind(&user.login_handle)
        .bind(user.class)
        .bind(user.role)
        .bind(&user.employee_id)
        .bind(&user.job_position)
        .bind(organization)
        .bind(job_level)
        .bind(user.app_feedback_submitted)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ReviewError::LoginTaken
            } else {
                unavailable(e)
            }
        })?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ReviewError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_login(&self, login_handle: &str) -> Result<Option<User>, ReviewError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE login_handle = $1"
        ))
        .bind(login_handle)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self) -> Result<Vec<User>, ReviewError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), ReviewError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn question_list(&self, class: EmployeeClass) -> Result<Vec<String>, ReviewError> {
        let questions: Option<Json<Vec<String>>> =
            sqlx::query_scalar("SELECT questions FROM question_sets WHERE employee_class = $1")
                .bind(class)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;
        Ok(questions.map(|q| q.0).unwrap_or_default())
    }

    async fn replace_question_list(
        &self,
        class: EmployeeClass,
        questions: &[String],
    ) -> Result<(), ReviewError> {
        sqlx::query(
            r#"
            INSERT INTO question_sets (employee_class, questions, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (employee_class)
            DO UPDATE SET questions = EXCLUDED.questions, updated_at = now()
            "#,
        )
        .bind(class)
        .bind(Json(questions))
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn insert_assignment(
        &self,
        reviewer_id: Uuid,
        reviewee_id: Uuid,
        class: EmployeeClass,
    ) -> Result<Assignment, ReviewError> {
        let row = sqlx::query_as::<_, AssignmentRow>(
            r#"
            INSERT INTO review_assignments (id, reviewer_id, reviewee_id, employee_class)
            VALUES ($1, $2, $3, $4)
            RETURNING id, reviewer_id, reviewee_id, employee_class, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reviewer_id)
        .bind(reviewee_id)
        .bind(class)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ReviewError::DuplicateAssignment
            } else {
                unavailable(e)
            }
        })?;
        Ok(row.into())
    }

    async fn list_assignments(&self, class: EmployeeClass) -> Result<Vec<Assignment>, ReviewError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, reviewer_id, reviewee_id, employee_class, created_at
            FROM review_assignments
            WHERE employee_class = $1
            ORDER BY created_at
            "#,
        )
        .bind(class)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(rows.into_iter().map(Assignment::from).collect())
    }

    async fn assignments_for_reviewer(
        &self,
        reviewer_id: Uuid,
    ) -> Result<Vec<Assignment>, ReviewError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT id, reviewer_id, reviewee_id, employee_class, created_at
            FROM review_assignments
            WHERE reviewer_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(reviewer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(rows.into_iter().map(Assignment::from).collect())
    }

    async fn delete_assignment(&self, id: Uuid) -> Result<(), ReviewError> {
        sqlx::query("DELETE FROM review_assignments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<Submission, ReviewError> {
        let enc_comment = self
            .seal(Some(&submission.comment))?
            .unwrap_or_default();
        let enc_development_suggestion = self.seal(submission.development_suggestion.as_deref())?;

        // UNIQUE (reviewer_id, reviewee_id) turns a concurrent double submit into a
        // constraint violation instead of a second row.
        let row: (Uuid, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO reviews (id, reviewer_id, reviewee_id, scores, enc_comment, enc_development_suggestion)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(submission.reviewer_id)
        .bind(submission.reviewee_id)
        .bind(Json(&submission.scores))
        .bind(enc_comment)
        .bind(enc_development_suggestion)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ReviewError::AlreadyReviewed
            } else {
                unavailable(e)
            }
        })?;

        Ok(Submission {
            id: row.0,
            reviewer_id: submission.reviewer_id,
            reviewee_id: submission.reviewee_id,
            scores: submission.scores,
            comment: submission.comment,
            development_suggestion: submission.development_suggestion,
            submitted_at: row.1,
        })
    }

    async fn reviewed_reviewees(&self, reviewer_id: Uuid) -> Result<HashSet<Uuid>, ReviewError> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT reviewee_id FROM reviews WHERE reviewer_id = $1")
                .bind(reviewer_id)
                .fetch_all(&self.pool)
                .await
                .map_err(unavailable)?;
        Ok(ids.into_iter().collect())
    }

    async fn submissions_for_reviewee(
        &self,
        reviewee_id: Uuid,
    ) -> Result<Vec<Submission>, ReviewError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE reviewee_id = $1 ORDER BY created_at"
        ))
        .bind(reviewee_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        self.open_reviews(rows)
    }

    async fn all_submissions(&self) -> Result<Vec<Submission>, ReviewError> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        self.open_reviews(rows)
    }

    async fn record_app_feedback(
        &self,
        feedback: NewAppFeedback,
    ) -> Result<AppFeedback, ReviewError> {
        let enc_suggestion = self.seal(feedback.suggestion.as_deref())?;

        // Dropping `tx` on any early return rolls back both writes.
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let submitted: Option<bool> = sqlx::query_scalar(
            "SELECT app_feedback_submitted FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(feedback.user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unavailable)?;
        match submitted {
            None => return Err(ReviewError::NotFound { entity: "user" }),
            Some(true) => return Err(ReviewError::FeedbackAlreadySubmitted),
            Some(false) => {}
        }

        let row: (Uuid, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO app_feedback (id, user_id, user_name, ease_of_use_rating, enc_suggestion)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(feedback.user_id)
        .bind(&feedback.user_name)
        .bind(i16::from(feedback.rating))
        .bind(enc_suggestion)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ReviewError::FeedbackAlreadySubmitted
            } else {
                unavailable(e)
            }
        })?;

        sqlx::query("UPDATE users SET app_feedback_submitted = TRUE WHERE id = $1")
            .bind(feedback.user_id)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;

        Ok(AppFeedback {
            id: row.0,
            user_id: feedback.user_id,
            user_name: feedback.user_name,
            rating: feedback.rating,
            suggestion: feedback.suggestion,
            submitted_at: row.1,
        })
    }

    async fn list_app_feedback(&self) -> Result<Vec<AppFeedback>, ReviewError> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT id, user_id, user_name, ease_of_use_rating, enc_suggestion, created_at
            FROM app_feedback
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter()
            .map(|row| {
                let suggestion = self
                    .cipher
                    .open_opt(row.enc_suggestion.as_deref())
                    .map_err(|e| {
                        tracing::error!("Failed to open feedback {}: {}", row.id, e);
                        ReviewError::CollaboratorUnavailable {
                            collaborator: COLLABORATOR,
                        }
                    })?;
                Ok(AppFeedback {
                    id: row.id,
                    user_id: row.user_id,
                    user_name: row.user_name,
                    rating: u8::try_from(row.ease_of_use_rating).unwrap_or(0),
                    suggestion,
                    submitted_at: row.created_at,
                })
            })
            .collect()
    }
}
