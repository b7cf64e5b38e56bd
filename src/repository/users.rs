use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::KeyValueStore;
use crate::types::{Category, ProfileUpdate, StoredUser, User};

/// Storage key of the user table when the repository is persisted.
pub const USERS_KEY: &str = "users";

/// Fields supplied when creating an account. The repository assigns the id
/// and creation time.
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub selected_categories: BTreeSet<Category>,
}

/// Which unique field of an existing account a new value collides with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    Email,
    Username,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up a user by id.
    async fn get(&self, id: &str) -> Option<User>;

    /// Find the user whose email or username equals `identifier` and whose
    /// password matches.
    async fn authenticate(&self, identifier: &str, password: &SecretString) -> Option<User>;

    /// Check `email` and `username` against every account except
    /// `exclude_id`. Email is checked first.
    async fn find_conflict(
        &self,
        email: &str,
        username: &str,
        exclude_id: Option<&str>,
    ) -> Option<Conflict>;

    /// Append a new account and return it without its password.
    async fn insert(&self, new_user: NewUser) -> User;

    /// Apply a partial update. Returns `None` if the id is unknown.
    async fn update(&self, id: &str, update: ProfileUpdate) -> Option<User>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// Stored shape of one account. The password is kept in plaintext: this is
/// a mock credential store.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    #[serde(flatten)]
    user: User,
    password: String,
}

impl From<&StoredUser> for UserRecord {
    fn from(stored: &StoredUser) -> Self {
        Self {
            user: stored.user.clone(),
            password: stored.password.expose_secret().to_string(),
        }
    }
}

impl From<UserRecord> for StoredUser {
    fn from(record: UserRecord) -> Self {
        Self {
            user: record.user,
            password: SecretString::from(record.password),
        }
    }
}

struct Inner {
    users: Vec<StoredUser>,
    next_id: u64,
}

/// Vec-backed user repository, optionally mirrored to a [`KeyValueStore`].
///
/// Ids are decimal strings. New ids are allocated past the largest numeric
/// id seen so far, so seeded and inserted accounts never collide.
pub struct InMemoryUserRepository {
    inner: RwLock<Inner>,
    storage: Option<(Arc<dyn KeyValueStore>, String)>,
}

impl InMemoryUserRepository {
    pub fn new(users: Vec<StoredUser>) -> Self {
        let next_id = users
            .iter()
            .filter_map(|u| u.user.id.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        Self {
            inner: RwLock::new(Inner { users, next_id }),
            storage: None,
        }
    }

    /// Repository holding only the demo account.
    pub fn with_demo_users() -> Self {
        Self::new(super::demo_users())
    }

    /// Repository loaded from `storage[key]` and written back after every
    /// insert or update.
    ///
    /// A missing entry starts from the demo account. An unreadable entry is
    /// logged and also starts from the demo account.
    pub fn persisted(storage: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let users = match storage.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<UserRecord>>(&raw) {
                Ok(records) => {
                    tracing::debug!(count = records.len(), "Loaded user records");
                    records.into_iter().map(StoredUser::from).collect()
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding corrupt user records");
                    super::demo_users()
                }
            },
            Ok(None) => super::demo_users(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read user records");
                super::demo_users()
            }
        };

        Self {
            storage: Some((storage, key)),
            ..Self::new(users)
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Failures are logged; the in-memory table stays authoritative.
    fn save(&self, users: &[StoredUser]) {
        let Some((storage, key)) = &self.storage else {
            return;
        };
        let records: Vec<UserRecord> = users.iter().map(UserRecord::from).collect();
        let json = match serde_json::to_string(&records) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize user records");
                return;
            }
        };
        if let Err(e) = storage.set(key, &json) {
            tracing::warn!(key = %key, error = %e, "Failed to persist user records");
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: &str) -> Option<User> {
        let inner = self.inner.read().await;
        inner
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone())
    }

    async fn authenticate(&self, identifier: &str, password: &SecretString) -> Option<User> {
        let inner = self.inner.read().await;
        // Plaintext comparison: this repository is a stand-in, not a credential store.
        inner
            .users
            .iter()
            .find(|u| {
                (u.user.email == identifier || u.user.username == identifier)
                    && u.password.expose_secret() == password.expose_secret()
            })
            .map(|u| u.user.clone())
    }

    async fn find_conflict(
        &self,
        email: &str,
        username: &str,
        exclude_id: Option<&str>,
    ) -> Option<Conflict> {
        let inner = self.inner.read().await;
        let others: Vec<&User> = inner
            .users
            .iter()
            .map(|u| &u.user)
            .filter(|u| Some(u.id.as_str()) != exclude_id)
            .collect();

        if others.iter().any(|u| u.email == email) {
            Some(Conflict::Email)
        } else if others.iter().any(|u| u.username == username) {
            Some(Conflict::Username)
        } else {
            None
        }
    }

    async fn insert(&self, new_user: NewUser) -> User {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;

        let user = User {
            id: id.to_string(),
            username: new_user.username,
            email: new_user.email,
            selected_categories: new_user.selected_categories,
            created_at: Utc::now(),
        };
        inner.users.push(StoredUser {
            user: user.clone(),
            password: new_user.password,
        });
        self.save(&inner.users);
        tracing::debug!(user_id = %user.id, "Inserted user record");
        user
    }

    async fn update(&self, id: &str, update: ProfileUpdate) -> Option<User> {
        let mut inner = self.inner.write().await;
        let stored = inner.users.iter_mut().find(|u| u.user.id == id)?;

        if let Some(username) = update.username {
            stored.user.username = username;
        }
        if let Some(email) = update.email {
            stored.user.email = email;
        }
        if let Some(categories) = update.selected_categories {
            stored.user.selected_categories = categories;
        }
        let user = stored.user.clone();
        self.save(&inner.users);
        Some(user)
    }
}
