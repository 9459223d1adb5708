pub mod admin;
pub mod auth;
pub mod feedback;
pub mod results;
pub mod reviews;
pub mod session;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/reviews", reviews::router(state.clone()))
        .nest("/results", results::router(state.clone()))
        .nest("/feedback", feedback::router(state.clone()))
        .nest("/admin", admin::router(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::directory::fixtures::new_user;
    use crate::domain::directory::register_user;
    use crate::domain::models::{EmployeeClass, User, UserRole};
    use crate::services::identity::MemoryIdentityDirectory;
    use crate::state::fixtures::{memory_state, SESSION_KEY};
    use crate::store::{MemoryStore, ReviewStore};
    use crate::web::session::sign_session;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const TIMELINESS: &str = "Timeliness;Always late;Sometimes late;Always on time";

    async fn user(
        store: &MemoryStore,
        identity: &MemoryIdentityDirectory,
        login: &str,
        class: EmployeeClass,
        role: UserRole,
    ) -> (User, String) {
        let user = register_user(store, identity, new_user(login, class), role)
            .await
            .unwrap();
        let token = sign_session(user.id, user.role, &SESSION_KEY).unwrap();
        (user, token)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        send(app, request).await
    }

    fn json_of(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public_and_other_routes_need_a_session() {
        let (state, _, _) = memory_state();
        let app = routes(state);
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");

        let (status, _) = call(&app, Method::GET, "/reviews/pending", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, Method::GET, "/auth/me", Some("forged.token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_then_login_returns_session() {
        let (state, _, _) = memory_state();
        let app = routes(state);
        let payload = json!({
            "login_handle": "sinta",
            "secret": "RN-1234",
            "display_name": "Sinta",
            "employee_id": "RN-1234",
            "job_position": "Operator",
            "class": "operator",
        });
        let (status, body) =
            call(&app, Method::POST, "/auth/register", None, Some(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json_of(&body)["role"], "EMPLOYEE");

        let (status, body) = call(&app, Method::POST, "/auth/register", None, Some(payload)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json_of(&body)["error"], "login_taken");

        let login = json!({ "login_handle": "sinta", "secret": "RN-1234" });
        let (status, body) = call(&app, Method::POST, "/auth/login", None, Some(login)).await;
        assert_eq!(status, StatusCode::OK);
        let token = json_of(&body)["token"].as_str().unwrap().to_string();

        let (status, body) = call(&app, Method::GET, "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["class"], "hourly");

        let wrong = json!({ "login_handle": "sinta", "secret": "nope" });
        let (status, _) = call(&app, Method::POST, "/auth/login", None, Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_is_rate_limited_per_client() {
        let (state, _, _) = memory_state();
        let app = routes(state);
        let wrong = json!({ "login_handle": "ghost", "secret": "nope" });
        for _ in 0..crate::state::LOGIN_ATTEMPTS {
            let (status, _) =
                call(&app, Method::POST, "/auth/login", None, Some(wrong.clone())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, _) = call(&app, Method::POST, "/auth/login", None, Some(wrong)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn rotating_forwarded_for_does_not_reset_the_login_limit() {
        let (state, _, _) = memory_state();
        let app = routes(state);
        let wrong = json!({ "login_handle": "ghost", "secret": "nope" });
        let mut statuses = Vec::new();
        for i in 0..4 * crate::state::LOGIN_ATTEMPTS {
            let request = Request::builder()
                .method(Method::POST)
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", format!("198.51.100.{i}"))
                .body(Body::from(wrong.to_string()))
                .unwrap();
            statuses.push(send(&app, request).await.0);
        }
        assert!(statuses[..crate::state::LOGIN_ATTEMPTS]
            .iter()
            .all(|s| *s == StatusCode::UNAUTHORIZED));
        assert!(statuses[crate::state::LOGIN_ATTEMPTS..]
            .iter()
            .all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn token_for_a_role_the_user_lacks_is_refused() {
        let (state, store, identity) = memory_state();
        let app = routes(state);
        let (budi, _) =
            user(&store, &identity, "budi", EmployeeClass::Hourly, UserRole::Employee).await;
        let elevated = sign_session(budi.id, UserRole::Admin, &SESSION_KEY).unwrap();
        let (status, _) = call(&app, Method::GET, "/admin/users", Some(&elevated), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn employees_cannot_reach_admin_routes() {
        let (state, store, identity) = memory_state();
        let app = routes(state);
        let (_, token) =
            user(&store, &identity, "budi", EmployeeClass::Hourly, UserRole::Employee).await;
        for uri in ["/admin/users", "/admin/export/hourly", "/admin/app-feedback"] {
            let (status, body) = call(&app, Method::GET, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
            assert_eq!(json_of(&body)["error"], "forbidden");
        }
    }

    #[tokio::test]
    async fn review_round_trip_through_the_api() {
        let (state, store, identity) = memory_state();
        let app = routes(state);
        let (_, admin) =
            user(&store, &identity, "admin", EmployeeClass::Salaried, UserRole::Admin).await;
        let (lead, lead_token) =
            user(&store, &identity, "lead", EmployeeClass::Salaried, UserRole::Employee).await;
        let (op, op_token) =
            user(&store, &identity, "op", EmployeeClass::Hourly, UserRole::Employee).await;

        let questions = json!({ "questions": [TIMELINESS, "Safety;Careless"] });
        let (status, body) =
            call(&app, Method::PUT, "/admin/questions/hourly", Some(&admin), Some(questions))
                .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_of(&body)["field"], "questions[1]");
        let questions = json!({ "questions": [TIMELINESS] });
        let (status, _) =
            call(&app, Method::PUT, "/admin/questions/hourly", Some(&admin), Some(questions))
                .await;
        assert_eq!(status, StatusCode::OK);

        let edge = json!({ "reviewer_id": lead.id, "reviewee_id": op.id, "class": "hourly" });
        let (status, _) =
            call(&app, Method::POST, "/admin/assignments", Some(&admin), Some(edge.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) =
            call(&app, Method::POST, "/admin/assignments", Some(&admin), Some(edge)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json_of(&body)["error"], "duplicate_assignment");

        let (_, body) = call(&app, Method::GET, "/reviews/pending", Some(&lead_token), None).await;
        assert_eq!(json_of(&body).as_array().unwrap().len(), 1);

        let uri = format!("/reviews/form/{}", op.id);
        let (status, body) = call(&app, Method::GET, &uri, Some(&lead_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let form = json_of(&body);
        assert_eq!(form["questions"][0]["type"], "choice");
        assert_eq!(form["scale_max"], 3);

        let review = json!({
            "reviewee_id": op.id,
            "answers": { TIMELINESS: "Always on time" },
            "comment": "Never late",
        });
        let (status, _) =
            call(&app, Method::POST, "/reviews", Some(&lead_token), Some(review.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) =
            call(&app, Method::POST, "/reviews", Some(&lead_token), Some(review)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json_of(&body)["error"], "already_reviewed");

        let (_, body) = call(&app, Method::GET, "/reviews/pending", Some(&lead_token), None).await;
        assert!(json_of(&body).as_array().unwrap().is_empty());

        let (_, body) = call(&app, Method::GET, "/results/me", Some(&op_token), None).await;
        let results = json_of(&body);
        assert_eq!(results["reviews"][0]["answers"][0]["selected"], "Always on time");
        assert_eq!(results["aggregate"]["status"], "summary");
        assert_eq!(results["aggregate"]["overall_ratio"], 1.0);

        let (_, body) =
            call(&app, Method::GET, "/results/me/summary", Some(&op_token), None).await;
        assert_eq!(json_of(&body)["status"], "disabled");

        let (status, body) =
            call(&app, Method::GET, "/admin/export/hourly", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let csv = String::from_utf8(body).unwrap();
        assert!(csv.starts_with("Reviewer,Reviewee,"));
        assert!(csv.contains("lead,op,3,Never late,N/A,"));
    }

    #[tokio::test]
    async fn app_feedback_is_accepted_once() {
        let (state, store, identity) = memory_state();
        let app = routes(state);
        let (user_row, token) =
            user(&store, &identity, "rina", EmployeeClass::Salaried, UserRole::Employee).await;

        let (_, body) = call(&app, Method::GET, "/feedback/app", Some(&token), None).await;
        assert_eq!(json_of(&body)["submitted"], false);

        let payload = json!({ "rating": 4, "suggestion": "Dark mode" });
        let (status, _) =
            call(&app, Method::POST, "/feedback/app", Some(&token), Some(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) =
            call(&app, Method::POST, "/feedback/app", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json_of(&body)["error"], "feedback_already_submitted");

        assert!(store.find_user(user_row.id).await.unwrap().unwrap().app_feedback_submitted);
    }
}
