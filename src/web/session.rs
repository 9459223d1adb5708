use crate::domain::models::{Capability, User, UserRole};
use crate::error::ReviewError;
use crate::state::SharedState;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub role: UserRole,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

pub fn sign_session(user_id: Uuid, role: UserRole, key: &[u8]) -> Result<String, SessionError> {
    let exp = Utc::now() + Duration::hours(SESSION_HOURS);
    sign_claims(user_id, role, exp.timestamp(), key)
}

fn sign_claims(
    user_id: Uuid,
    role: UserRole,
    exp: i64,
    key: &[u8],
) -> Result<String, SessionError> {
    let payload = format!("{}|{}|{}", user_id, role_string(role), exp);
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload.as_bytes()),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::Invalid)?;
    let payload_bytes = general_purpose::STANDARD
        .decode(payload_b64)
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::STANDARD
        .decode(sig_b64)
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    let pieces: Vec<&str> = payload.split('|').collect();
    if pieces.len() != 3 {
        return Err(SessionError::Invalid);
    }
    let user_id = Uuid::parse_str(pieces[0]).map_err(|_| SessionError::Invalid)?;
    let role = parse_role(pieces[1])?;
    let exp: i64 = pieces[2].parse().map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims { user_id, role })
}

/// Bearer token first, then the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(axum::http::header::COOKIE) {
        if let Ok(val) = cookie.to_str() {
            for pair in val.split(';') {
                if let Some(rest) = pair.trim().strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{secure_flag}",
        SESSION_HOURS * 3600
    )
}

pub fn cleared_cookie(secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{secure_flag}")
}

fn role_string(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "ADMIN",
        UserRole::Employee => "EMPLOYEE",
    }
}

fn parse_role(raw: &str) -> Result<UserRole, SessionError> {
    match raw {
        "ADMIN" => Ok(UserRole::Admin),
        "EMPLOYEE" => Ok(UserRole::Employee),
        _ => Err(SessionError::Role),
    }
}

/// Authenticated caller, loaded fresh from the store on every request. Deleted users
/// and tokens minted for a role the user no longer has are rejected.
pub struct UserSession(pub User);

impl UserSession {
    pub fn require(&self, capability: Capability) -> Result<&User, ReviewError> {
        if self.0.role.can(capability) {
            Ok(&self.0)
        } else {
            tracing::warn!("User {} denied {:?}", self.0.id, capability);
            Err(ReviewError::Forbidden)
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared_state = SharedState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = verify_session(&token, &shared_state.session_key).map_err(|e| {
            tracing::warn!("Session verification failed: {}", e);
            StatusCode::UNAUTHORIZED
        })?;

        let user = shared_state
            .store
            .find_user(claims.user_id)
            .await
            .map_err(|e| {
                tracing::error!("User lookup failed for session: {}", e);
                StatusCode::SERVICE_UNAVAILABLE
            })?;

        let Some(user) = user else {
            tracing::warn!("Session for unknown user {}", claims.user_id);
            return Err(StatusCode::UNAUTHORIZED);
        };
        if user.role != claims.role {
            tracing::warn!("Session role no longer matches user {}", user.id);
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(UserSession(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const KEY: [u8; 32] = [9; 32];

    #[test]
    fn signed_session_verifies() {
        let id = Uuid::new_v4();
        let token = sign_session(id, UserRole::Admin, &KEY).unwrap();
        let claims = verify_session(&token, &KEY).unwrap();
        assert_eq!(claims.user_id, id);
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn tampered_or_expired_tokens_are_rejected() {
        let id = Uuid::new_v4();
        let token = sign_session(id, UserRole::Employee, &KEY).unwrap();
        assert_eq!(verify_session(&token, &[8; 32]).unwrap_err(), SessionError::Signature);

        let forged_payload = general_purpose::STANDARD.encode(format!("{id}|ADMIN|9999999999"));
        let (_, sig) = token.split_once('.').unwrap();
        assert_eq!(
            verify_session(&format!("{forged_payload}.{sig}"), &KEY).unwrap_err(),
            SessionError::Signature
        );

        let stale = sign_claims(id, UserRole::Employee, Utc::now().timestamp() - 1, &KEY).unwrap();
        assert_eq!(verify_session(&stale, &KEY).unwrap_err(), SessionError::Expired);
        assert_eq!(verify_session("garbage", &KEY).unwrap_err(), SessionError::Invalid);
    }

    #[test]
    fn token_is_read_from_bearer_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc.def"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer xyz.uvw"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz.uvw"));
    }

    #[test]
    fn cookie_carries_http_only_and_optional_secure() {
        assert!(session_cookie("t", false).contains("HttpOnly"));
        assert!(!session_cookie("t", false).contains("Secure"));
        assert!(session_cookie("t", true).ends_with("; Secure"));
    }
}
