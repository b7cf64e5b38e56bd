use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

// ============================================================================
// Categories
// ============================================================================

/// Fixed set of news categories.
///
/// Ordering follows declaration order so a `BTreeSet<Category>` lists
/// categories the same way the category picker does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Technology,
    Sports,
    Politics,
    Business,
    Entertainment,
    Health,
    Science,
    World,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Technology,
        Category::Sports,
        Category::Politics,
        Category::Business,
        Category::Entertainment,
        Category::Health,
        Category::Science,
        Category::World,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Technology => "Technology",
            Category::Sports => "Sports",
            Category::Politics => "Politics",
            Category::Business => "Business",
            Category::Entertainment => "Entertainment",
            Category::Health => "Health",
            Category::Science => "Science",
            Category::World => "World",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Case-insensitive so CLI input like `science` resolves.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownCategory(trimmed.to_string()))
    }
}

/// Categories assigned to a freshly registered account.
pub fn default_categories() -> BTreeSet<Category> {
    BTreeSet::from([Category::Technology])
}

// ============================================================================
// Users and Sessions
// ============================================================================

/// A user as seen by the stores. Never carries a password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub selected_categories: BTreeSet<Category>,
    pub created_at: DateTime<Utc>,
}

/// A user record as held by the user repository, password included.
///
/// Only the repository sees this type; everything crossing the facade is a
/// [`User`].
#[derive(Debug)]
pub struct StoredUser {
    pub user: User,
    pub password: SecretString,
}

/// Current authentication state.
///
/// `is_signed_in()` is derived from `user` so the two can never disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
}

impl Session {
    pub fn signed_in(user: User, token: String) -> Self {
        Self {
            user: Some(user),
            token: Some(token),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            is_signed_in: self.is_signed_in(),
            user: self.user.clone(),
            token: self.token.clone(),
        }
    }
}

/// Wire shape of the session slot in client-side storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub is_signed_in: bool,
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
}

impl PersistedSession {
    /// Convert back into a live session.
    ///
    /// Returns `None` when the flag and the user disagree; such a record is
    /// treated the same as unparseable data.
    pub fn into_session(self) -> Option<Session> {
        match (self.is_signed_in, self.user) {
            (true, Some(user)) => Some(Session {
                user: Some(user),
                token: self.token,
            }),
            (false, None) => Some(Session::default()),
            _ => None,
        }
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Shortest password accepted at registration, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug)]
pub struct LoginCredentials {
    /// Email address or username.
    pub identifier: String,
    pub password: SecretString,
}

impl LoginCredentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: SecretString::from(password.into()),
        }
    }
}

#[derive(Debug)]
pub struct RegisterCredentials {
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

impl RegisterCredentials {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: SecretString::from(password.into()),
            confirm_password: SecretString::from(confirm_password.into()),
        }
    }
}

/// Partial profile update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub selected_categories: Option<BTreeSet<Category>>,
}

// ============================================================================
// Articles and Pagination
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub summary: String,
    pub category: Category,
    pub source_url: Url,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Url>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationRequest {
    pub page: u32,
    pub limit: u32,
    /// `None` or an empty set disables filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeSet<Category>>,
}

impl PaginationRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            categories: None,
        }
    }

    pub fn with_categories(mut self, categories: Option<BTreeSet<Category>>) -> Self {
        self.categories = categories;
        self
    }

    /// The effective filter, if any.
    pub fn filter(&self) -> Option<&BTreeSet<Category>> {
        self.categories.as_ref().filter(|c| !c.is_empty())
    }
}

/// One page of articles plus the page count of the filtered collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub total_pages: u32,
}

/// State owned by the article store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleListState {
    pub articles: Vec<Article>,
    pub current_page: u32,
    pub total_pages: u32,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for ArticleListState {
    fn default() -> Self {
        Self {
            articles: Vec::new(),
            current_page: 1,
            total_pages: 1,
            loading: false,
            error: None,
        }
    }
}

impl ArticleListState {
    pub fn has_next_page(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_previous_page(&self) -> bool {
        self.current_page > 1
    }
}

// ============================================================================
// Response Envelope
// ============================================================================

/// Uniform response envelope used by the backend contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }
}

/// Login/register payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}
