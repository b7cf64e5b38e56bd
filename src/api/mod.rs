//! Backend boundary consumed by the stores.
//!
//! The application has no server yet. [`NewsApi`] is the contract a real
//! HTTP client will implement; until then two in-process implementations
//! stand in for it:
//!
//! - [`RepositoryApi`] - full semantics over injected repositories
//! - [`CannedApi`] - fixed demo responses for wiring up views
//!
//! Each call waits the configured [`Latency`] and then yields exactly one
//! outcome. There is no retry logic at this layer.

mod backend;
mod canned;

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

use crate::types::{
    ApiResponse, Article, ArticlePage, AuthPayload, Category, LoginCredentials, PaginationRequest,
    ProfileUpdate, RegisterCredentials, User,
};

pub use backend::RepositoryApi;
pub use canned::{CannedApi, TAKEN_EMAIL, TAKEN_USERNAME};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Invalid email/username or password")]
    InvalidCredentials,

    #[error("A user with this email already exists")]
    EmailTaken,

    #[error("A user with this username already exists")]
    UsernameTaken,

    /// The session token was rejected (HTTP 401 equivalent).
    #[error("Your session has expired, please sign in again")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

// ============================================================================
// Latency
// ============================================================================

/// Artificial delay applied before every simulated response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latency(Duration);

impl Latency {
    pub const NONE: Latency = Latency(Duration::ZERO);

    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    pub fn duration(self) -> Duration {
        self.0
    }

    pub async fn wait(self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}

// ============================================================================
// Tokens
// ============================================================================

const TOKEN_PREFIX: &str = "mock-jwt-token-";

/// Bearer token issued for a user. Not signed; the mock backends trust it.
pub fn token_for(user_id: &str) -> String {
    format!("{TOKEN_PREFIX}{user_id}")
}

/// User id carried by a token issued by [`token_for`].
pub fn user_id_from_token(token: &str) -> Option<&str> {
    token.strip_prefix(TOKEN_PREFIX).filter(|id| !id.is_empty())
}

// ============================================================================
// Contract
// ============================================================================

#[async_trait]
pub trait NewsApi: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> ApiResult<AuthPayload>;

    async fn register(&self, credentials: &RegisterCredentials) -> ApiResult<AuthPayload>;

    /// Invalidate the token server-side. Clients clear their session
    /// regardless of the outcome.
    async fn logout(&self, token: Option<&str>) -> ApiResult<()>;

    async fn get_current_user(&self, token: &str) -> ApiResult<User>;

    async fn get_news(&self, request: &PaginationRequest) -> ApiResult<ArticlePage>;

    async fn get_news_by_id(&self, id: u64) -> ApiResult<Article>;

    async fn get_categories(&self) -> ApiResult<Vec<Category>>;

    async fn update_profile(&self, token: &str, update: ProfileUpdate) -> ApiResult<User>;

    async fn update_categories(
        &self,
        token: &str,
        categories: &BTreeSet<Category>,
    ) -> ApiResult<User>;
}
