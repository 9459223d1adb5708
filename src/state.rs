use crate::middleware::RateLimiter;
use crate::services::ai::AiService;
use crate::services::identity::IdentityDirectory;
use crate::store::ReviewStore;
use std::sync::Arc;

/// Login attempts allowed per client within the window.
pub const LOGIN_ATTEMPTS: usize = 5;
pub const LOGIN_WINDOW_SECS: u64 = 60;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReviewStore>,
    pub identity: Arc<dyn IdentityDirectory>,
    /// `None` when no OpenAI key is configured; summaries then report `Disabled`.
    pub ai: Option<Arc<AiService>>,
    pub session_key: Vec<u8>,
    pub login_limiter: RateLimiter,
    pub cookie_secure: bool,
    pub trust_forwarded_for: bool,
}

pub type SharedState = Arc<AppState>;
