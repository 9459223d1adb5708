use crate::domain::directory::{register_user, sign_in};
use crate::domain::models::{EmployeeClass, NewUser, User, UserRole};
use crate::state::SharedState;
use crate::web::session::{self, UserSession};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub login_handle: String,
    pub secret: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub role: UserRole,
    pub name: String,
    pub class: EmployeeClass,
    /// Also set as the session cookie; API clients send it as a bearer token.
    pub token: String,
}

/// The caller's profile; login handle and secret never leave the server.
#[derive(Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
    pub class: EmployeeClass,
    pub role: UserRole,
    pub employee_id: String,
    pub job_position: String,
    pub organization: Option<String>,
    pub job_level: Option<String>,
    pub app_feedback_submitted: bool,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            class: user.class,
            role: user.role,
            employee_id: user.employee_id.clone(),
            job_position: user.job_position.clone(),
            organization: user.salaried_profile.as_ref().map(|p| p.organization.clone()),
            job_level: user.salaried_profile.as_ref().map(|p| p.job_level.clone()),
            app_feedback_submitted: user.app_feedback_submitted,
        }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(state)
}

/// Client identifier for rate limiting: the peer address, or the first forwarded
/// address when the proxy in front is trusted to set it.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    let forwarded = if trust_forwarded_for {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    } else {
        None
    };
    forwarded
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn with_cookie(cookie: String) -> Result<HeaderMap, Response> {
    let value = HeaderValue::from_str(&cookie).map_err(|e| {
        tracing::error!("Invalid session cookie header: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

/// Self-service registration always creates an employee; admins come from bootstrap.
async fn register(
    State(state): State<SharedState>,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<Profile>), Response> {
    let user = register_user(
        state.store.as_ref(),
        state.identity.as_ref(),
        payload,
        UserRole::Employee,
    )
    .await
    .map_err(IntoResponse::into_response)?;
    Ok((StatusCode::CREATED, Json(Profile::from(&user))))
}

async fn login(
    State(state): State<SharedState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, Response> {
    let client = client_key(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.trust_forwarded_for,
    );
    if !state.login_limiter.check(&client).await {
        tracing::warn!("Login rate limit exceeded for client: {}", client);
        return Err(StatusCode::TOO_MANY_REQUESTS.into_response());
    }

    let user = sign_in(
        state.store.as_ref(),
        state.identity.as_ref(),
        &payload.login_handle,
        &payload.secret,
    )
    .await
    .map_err(IntoResponse::into_response)?
    .ok_or_else(|| {
        tracing::info!("Failed login for {:?}", payload.login_handle.trim());
        StatusCode::UNAUTHORIZED.into_response()
    })?;

    let token = session::sign_session(user.id, user.role, &state.session_key).map_err(|e| {
        tracing::error!("Failed to sign session: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })?;
    let headers = with_cookie(session::session_cookie(&token, state.cookie_secure))?;

    tracing::info!("User {} logged in", user.id);
    Ok((
        headers,
        Json(LoginResponse {
            user_id: user.id,
            role: user.role,
            name: user.display_name,
            class: user.class,
            token,
        }),
    ))
}

async fn logout(State(state): State<SharedState>) -> Result<impl IntoResponse, Response> {
    let headers = with_cookie(session::cleared_cookie(state.cookie_secure))?;
    Ok((headers, StatusCode::NO_CONTENT))
}

async fn me(UserSession(user): UserSession) -> Json<Profile> {
    Json(Profile::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_address_keys_unless_proxy_is_trusted() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.1.1.1:5000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer), false), "10.1.1.1");
        assert_eq!(client_key(&headers, None, false), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_key(&headers, Some(peer), false), "10.1.1.1");
        assert_eq!(client_key(&headers, None, false), "unknown");
        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.9");
    }
}
