use secrecy::ExposeSecret;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::api::{ApiError, NewsApi};
use crate::storage::KeyValueStore;
use crate::types::{
    AuthPayload, Category, LoginCredentials, PersistedSession, RegisterCredentials, Session, User,
    MIN_PASSWORD_LEN,
};

/// Storage key of the persisted session unless configured otherwise.
pub const DEFAULT_SESSION_KEY: &str = "authState";

// ============================================================================
// Error Types
// ============================================================================

/// Failures reported to the caller of a session action.
///
/// Messages are written for direct display next to a login/register form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Invalid email/username or password")]
    InvalidCredentials,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password must be at least {MIN_PASSWORD_LEN} characters long")]
    PasswordTooShort,

    #[error("A user with this email already exists")]
    EmailTaken,

    #[error("A user with this username already exists")]
    UsernameTaken,

    /// The backend repudiated the session; it has been cleared.
    #[error("Your session has expired, please sign in again")]
    Unauthorized,

    #[error("Another account request is still in progress")]
    RequestInFlight,

    #[error("{0}")]
    Backend(String),
}

impl From<ApiError> for SessionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidCredentials => SessionError::InvalidCredentials,
            ApiError::EmailTaken => SessionError::EmailTaken,
            ApiError::UsernameTaken => SessionError::UsernameTaken,
            ApiError::Unauthorized => SessionError::Unauthorized,
            other @ (ApiError::NotFound(_) | ApiError::InvalidRequest(_)) => {
                SessionError::Backend(other.to_string())
            }
        }
    }
}

// ============================================================================
// In-flight guard
// ============================================================================

/// Held for the duration of one mutating session action.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SessionError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(flag))
            .map_err(|_| SessionError::RequestInFlight)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// SessionStore
// ============================================================================

/// Who is signed in, and the actions that change it.
///
/// Every mutating action runs validate → backend call → state change →
/// persist → notify. The persisted copy lives in a single [`KeyValueStore`]
/// slot. Failing to write that slot is logged and never undoes the in-memory
/// change.
pub struct SessionStore {
    api: Arc<dyn NewsApi>,
    storage: Arc<dyn KeyValueStore>,
    storage_key: String,
    state: watch::Sender<Session>,
    in_flight: AtomicBool,
}

impl SessionStore {
    pub fn new(api: Arc<dyn NewsApi>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_storage_key(api, storage, DEFAULT_SESSION_KEY)
    }

    pub fn with_storage_key(
        api: Arc<dyn NewsApi>,
        storage: Arc<dyn KeyValueStore>,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            api,
            storage,
            storage_key: storage_key.into(),
            state: watch::Sender::new(Session::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    /// Selected categories of the signed-in user, empty when signed out.
    pub fn user_categories(&self) -> BTreeSet<Category> {
        self.state
            .borrow()
            .user
            .as_ref()
            .map(|u| u.selected_categories.clone())
            .unwrap_or_default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_signed_in()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Sign in with an email address or username.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<(), SessionError> {
        let _guard = InFlight::acquire(&self.in_flight)?;

        let payload = match self.api.login(credentials).await {
            Ok(response) => response.data,
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                return Err(e.into());
            }
        };

        tracing::info!(user_id = %payload.user.id, "Signed in");
        self.authenticate(payload);
        Ok(())
    }

    /// Create an account and sign in as it.
    pub async fn register(&self, credentials: &RegisterCredentials) -> Result<(), SessionError> {
        let password = credentials.password.expose_secret();
        if password != credentials.confirm_password.expose_secret() {
            return Err(SessionError::PasswordMismatch);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SessionError::PasswordTooShort);
        }

        let _guard = InFlight::acquire(&self.in_flight)?;

        let payload = match self.api.register(credentials).await {
            Ok(response) => response.data,
            Err(e) => {
                tracing::warn!(error = %e, "Registration failed");
                return Err(e.into());
            }
        };

        tracing::info!(user_id = %payload.user.id, "Registered and signed in");
        self.authenticate(payload);
        Ok(())
    }

    /// Forget the session locally. Never fails and never waits.
    pub fn logout(&self) {
        self.clear_persisted();
        self.state.send_replace(Session::default());
        tracing::info!("Signed out");
    }

    /// Replace the signed-in user's categories.
    ///
    /// Returns `Ok(false)` without contacting the backend when nobody is
    /// signed in.
    pub async fn update_categories(
        &self,
        categories: &BTreeSet<Category>,
    ) -> Result<bool, SessionError> {
        let (user_id, token) = {
            let session = self.state.borrow();
            match &session.user {
                Some(user) => (user.id.clone(), session.token.clone()),
                None => {
                    tracing::debug!("Ignoring category update while signed out");
                    return Ok(false);
                }
            }
        };

        let _guard = InFlight::acquire(&self.in_flight)?;

        let Some(token) = token else {
            tracing::warn!(user_id = %user_id, "Session has no token, signing out");
            self.repudiate();
            return Err(SessionError::Unauthorized);
        };

        if let Err(e) = self.api.update_categories(&token, categories).await {
            return Err(self.handle_api_error(e));
        }

        let applied = self.state.send_if_modified(|session| {
            // The user may have signed out while the request was pending.
            let Some(user) = session.user.as_mut().filter(|u| u.id == user_id) else {
                return false;
            };
            user.selected_categories = categories.clone();
            self.persist(session);
            true
        });

        if !applied {
            tracing::debug!(user_id = %user_id, "Session changed during category update");
            return Ok(false);
        }

        tracing::debug!(user_id = %user_id, count = categories.len(), "Updated categories");
        Ok(true)
    }

    /// Reload the signed-in user from the backend.
    ///
    /// Returns `Ok(false)` when signed out. A repudiated token clears the
    /// session and yields [`SessionError::Unauthorized`].
    pub async fn refresh_user(&self) -> Result<bool, SessionError> {
        let Some(token) = self.state.borrow().token.clone() else {
            return Ok(false);
        };

        let _guard = InFlight::acquire(&self.in_flight)?;

        let user = match self.api.get_current_user(&token).await {
            Ok(response) => response.data,
            Err(e) => return Err(self.handle_api_error(e)),
        };

        let replaced = self.state.send_if_modified(|session| {
            if session.token.as_deref() == Some(token.as_str()) {
                session.user = Some(user);
                self.persist(session);
                true
            } else {
                false
            }
        });
        Ok(replaced)
    }

    /// Load the persisted session at startup.
    ///
    /// Unreadable, unparseable or inconsistent records are discarded and the
    /// session stays empty. Returns whether a signed-in session was restored.
    pub fn restore_from_storage(&self) -> bool {
        let raw = match self.storage.get(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted session");
                return false;
            }
        };

        let restored = serde_json::from_str::<PersistedSession>(&raw)
            .ok()
            .and_then(PersistedSession::into_session);

        match restored {
            Some(session) => {
                let signed_in = session.is_signed_in();
                if let Some(user) = &session.user {
                    tracing::debug!(user_id = %user.id, "Restored persisted session");
                }
                self.state.send_replace(session);
                signed_in
            }
            None => {
                tracing::warn!(key = %self.storage_key, "Discarding corrupt persisted session");
                self.clear_persisted();
                false
            }
        }
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    fn authenticate(&self, payload: AuthPayload) {
        let session = Session::signed_in(payload.user, payload.token);
        self.persist(&session);
        self.state.send_replace(session);
    }

    /// Map a backend failure, clearing the session if the token was rejected.
    fn handle_api_error(&self, err: ApiError) -> SessionError {
        if err == ApiError::Unauthorized {
            tracing::warn!("Backend rejected session token, signing out");
            self.repudiate();
        } else {
            tracing::warn!(error = %err, "Session request failed");
        }
        err.into()
    }

    fn repudiate(&self) {
        self.clear_persisted();
        self.state.send_replace(Session::default());
    }

    /// Write `session` to the storage slot. Must not touch `self.state`, it
    /// may run while the channel is locked for writing.
    fn persist(&self, session: &Session) {
        let record = session.to_persisted();
        let json = match serde_json::to_string(&record) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize session");
                return;
            }
        };
        if let Err(e) = self.storage.set(&self.storage_key, &json) {
            tracing::warn!(error = %e, "Failed to persist session");
        }
    }

    fn clear_persisted(&self) {
        if let Err(e) = self.storage.remove(&self.storage_key) {
            tracing::warn!(error = %e, "Failed to remove persisted session");
        }
    }
}
