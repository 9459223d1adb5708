use crate::analytics::export::export_class;
use crate::domain::directory::delete_user;
use crate::domain::feedback::list_app_feedback;
use crate::domain::ledger::{add_assignment, list_assignments, remove_assignment};
use crate::domain::models::{
    AppFeedback, Assignment, AssignmentView, Capability, EmployeeClass, UserRole,
};
use crate::domain::questions::{question_form, replace_questions, QuestionForm, QuestionSet};
use crate::error::ReviewError;
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct ClassQuery {
    pub class: Option<EmployeeClass>,
}

#[derive(Deserialize)]
pub struct NewAssignment {
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub class: EmployeeClass,
}

#[derive(Deserialize)]
pub struct QuestionListPayload {
    pub questions: Vec<String>,
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub display_name: String,
    pub class: EmployeeClass,
    pub role: UserRole,
    pub job_position: String,
    pub created_at: DateTime<Utc>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/questions/:class", get(get_questions).put(put_questions))
        .route("/assignments", get(get_assignments).post(post_assignment))
        .route("/assignments/:id", delete(delete_assignment))
        .route("/users", get(get_users))
        .route("/users/:id", delete(remove_user))
        .route("/export/:class", get(export))
        .route("/app-feedback", get(get_app_feedback))
        .with_state(state)
}

async fn get_questions(
    session: UserSession,
    State(state): State<SharedState>,
    Path(class): Path<EmployeeClass>,
) -> Result<Json<QuestionForm>, ReviewError> {
    session.require(Capability::ManageQuestions)?;
    Ok(Json(question_form(state.store.as_ref(), class).await?))
}

async fn put_questions(
    session: UserSession,
    State(state): State<SharedState>,
    Path(class): Path<EmployeeClass>,
    Json(payload): Json<QuestionListPayload>,
) -> Result<Json<QuestionSet>, ReviewError> {
    session.require(Capability::ManageQuestions)?;
    Ok(Json(
        replace_questions(state.store.as_ref(), class, &payload.questions).await?,
    ))
}

/// Without `?class=` both classes are listed.
async fn get_assignments(
    session: UserSession,
    State(state): State<SharedState>,
    Query(query): Query<ClassQuery>,
) -> Result<Json<Vec<AssignmentView>>, ReviewError> {
    session.require(Capability::ManageAssignments)?;
    let classes = match query.class {
        Some(class) => vec![class],
        None => EmployeeClass::ALL.to_vec(),
    };
    let mut all = Vec::new();
    for class in classes {
        all.extend(list_assignments(state.store.as_ref(), class).await?);
    }
    Ok(Json(all))
}

async fn post_assignment(
    session: UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<NewAssignment>,
) -> Result<(StatusCode, Json<Assignment>), ReviewError> {
    session.require(Capability::ManageAssignments)?;
    let assignment = add_assignment(
        state.store.as_ref(),
        payload.reviewer_id,
        payload.reviewee_id,
        payload.class,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

async fn delete_assignment(
    session: UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ReviewError> {
    session.require(Capability::ManageAssignments)?;
    remove_assignment(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_users(
    session: UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<UserSummary>>, ReviewError> {
    session.require(Capability::ManageUsers)?;
    let mut users: Vec<UserSummary> = state
        .store
        .list_users()
        .await?
        .into_iter()
        .map(|u| UserSummary {
            id: u.id,
            display_name: u.display_name,
            class: u.class,
            role: u.role,
            job_position: u.job_position,
            created_at: u.created_at,
        })
        .collect();
    users.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    Ok(Json(users))
}

async fn remove_user(
    session: UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ReviewError> {
    let admin = session.require(Capability::ManageUsers)?;
    if admin.id == id {
        return Err(ReviewError::validation("id", "admins cannot delete themselves"));
    }
    delete_user(state.store.as_ref(), state.identity.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export(
    session: UserSession,
    State(state): State<SharedState>,
    Path(class): Path<EmployeeClass>,
) -> Result<Response, ReviewError> {
    session.require(Capability::ExportResults)?;
    let table = export_class(state.store.as_ref(), class).await?;
    let csv = table.to_csv().map_err(|e| {
        tracing::error!("CSV rendering failed: {}", e);
        ReviewError::CollaboratorUnavailable {
            collaborator: "export writer",
        }
    })?;
    let disposition = format!(
        "attachment; filename=\"reviews_{}_{}.csv\"",
        class.as_str(),
        Utc::now().format("%Y%m%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

async fn get_app_feedback(
    session: UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<AppFeedback>>, ReviewError> {
    session.require(Capability::ReadAppFeedback)?;
    Ok(Json(list_app_feedback(state.store.as_ref()).await?))
}
