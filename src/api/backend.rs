use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{token_for, user_id_from_token, ApiError, ApiResult, Latency, NewsApi};
use crate::repository::{
    paginate, ArticleRepository, Conflict, InMemoryArticleRepository, InMemoryUserRepository,
    NewUser, UserRepository, USERS_KEY,
};
use crate::storage::KeyValueStore;
use crate::types::{
    default_categories, ApiResponse, Article, ArticlePage, AuthPayload, Category,
    LoginCredentials, PaginationRequest, ProfileUpdate, RegisterCredentials, User,
    MIN_PASSWORD_LEN,
};

/// In-process backend over injected repositories.
///
/// This is where login lookup, registration conflicts, category filtering
/// and pagination live. Swapping in a real data source means providing other
/// repository implementations; the stores never notice.
pub struct RepositoryApi {
    users: Arc<dyn UserRepository>,
    articles: Arc<dyn ArticleRepository>,
    latency: Latency,
}

impl RepositoryApi {
    pub fn new(
        users: Arc<dyn UserRepository>,
        articles: Arc<dyn ArticleRepository>,
        latency: Latency,
    ) -> Self {
        Self {
            users,
            articles,
            latency,
        }
    }

    /// Backend seeded with the demo account and demo articles.
    pub fn with_demo_data(latency: Latency) -> Self {
        Self::new(
            Arc::new(InMemoryUserRepository::with_demo_users()),
            Arc::new(InMemoryArticleRepository::with_demo_articles()),
            latency,
        )
    }

    /// Backend whose accounts live in `storage` under [`USERS_KEY`], so
    /// registrations survive a restart. Articles are the demo set.
    pub fn with_persisted_users(storage: Arc<dyn KeyValueStore>, latency: Latency) -> Self {
        Self::new(
            Arc::new(InMemoryUserRepository::persisted(storage, USERS_KEY)),
            Arc::new(InMemoryArticleRepository::with_demo_articles()),
            latency,
        )
    }

    async fn resolve(&self, token: &str) -> Result<User, ApiError> {
        let user_id = user_id_from_token(token).ok_or(ApiError::Unauthorized)?;
        self.users.get(user_id).await.ok_or(ApiError::Unauthorized)
    }
}

impl From<Conflict> for ApiError {
    fn from(conflict: Conflict) -> Self {
        match conflict {
            Conflict::Email => ApiError::EmailTaken,
            Conflict::Username => ApiError::UsernameTaken,
        }
    }
}

#[async_trait]
impl NewsApi for RepositoryApi {
    async fn login(&self, credentials: &LoginCredentials) -> ApiResult<AuthPayload> {
        self.latency.wait().await;

        let user = self
            .users
            .authenticate(&credentials.identifier, &credentials.password)
            .await
            .ok_or(ApiError::InvalidCredentials)?;

        tracing::debug!(user_id = %user.id, "Backend accepted login");
        let token = token_for(&user.id);
        Ok(ApiResponse::ok(AuthPayload { user, token }))
    }

    async fn register(&self, credentials: &RegisterCredentials) -> ApiResult<AuthPayload> {
        self.latency.wait().await;

        let password = credentials.password.expose_secret();
        if password != credentials.confirm_password.expose_secret() {
            return Err(ApiError::InvalidRequest("Passwords do not match".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::InvalidRequest(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }

        if let Some(conflict) = self
            .users
            .find_conflict(&credentials.email, &credentials.username, None)
            .await
        {
            return Err(conflict.into());
        }

        let user = self
            .users
            .insert(NewUser {
                username: credentials.username.clone(),
                email: credentials.email.clone(),
                password: credentials.password.expose_secret().to_string().into(),
                selected_categories: default_categories(),
            })
            .await;

        tracing::info!(user_id = %user.id, username = %user.username, "Registered new account");
        let token = token_for(&user.id);
        Ok(ApiResponse::ok(AuthPayload { user, token }))
    }

    async fn logout(&self, _token: Option<&str>) -> ApiResult<()> {
        self.latency.wait().await;
        // Tokens are stateless; nothing to revoke.
        Ok(ApiResponse::ok(()))
    }

    async fn get_current_user(&self, token: &str) -> ApiResult<User> {
        self.latency.wait().await;
        Ok(ApiResponse::ok(self.resolve(token).await?))
    }

    async fn get_news(&self, request: &PaginationRequest) -> ApiResult<ArticlePage> {
        self.latency.wait().await;

        let filtered = self.articles.list(request.filter()).await;
        let page = paginate(&filtered, request.page, request.limit)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        tracing::debug!(
            page = request.page,
            limit = request.limit,
            filtered = filtered.len(),
            total_pages = page.total_pages,
            "Served article page"
        );
        Ok(ApiResponse::ok(page))
    }

    async fn get_news_by_id(&self, id: u64) -> ApiResult<Article> {
        self.latency.wait().await;
        self.articles
            .get(id)
            .await
            .map(ApiResponse::ok)
            .ok_or_else(|| ApiError::NotFound(format!("Article {id}")))
    }

    async fn get_categories(&self) -> ApiResult<Vec<Category>> {
        self.latency.wait().await;
        Ok(ApiResponse::ok(Category::ALL.to_vec()))
    }

    async fn update_profile(&self, token: &str, update: ProfileUpdate) -> ApiResult<User> {
        self.latency.wait().await;
        let current = self.resolve(token).await?;

        let email = update.email.as_deref().unwrap_or(&current.email);
        let username = update.username.as_deref().unwrap_or(&current.username);
        if let Some(conflict) = self
            .users
            .find_conflict(email, username, Some(&current.id))
            .await
        {
            tracing::debug!(user_id = %current.id, ?conflict, "Profile update rejected");
            return Err(conflict.into());
        }

        self.users
            .update(&current.id, update)
            .await
            .map(ApiResponse::ok)
            .ok_or(ApiError::Unauthorized)
    }

    async fn update_categories(
        &self,
        token: &str,
        categories: &BTreeSet<Category>,
    ) -> ApiResult<User> {
        self.latency.wait().await;
        let current = self.resolve(token).await?;

        let update = ProfileUpdate {
            selected_categories: Some(categories.clone()),
            ..ProfileUpdate::default()
        };
        self.users
            .update(&current.id, update)
            .await
            .map(ApiResponse::ok)
            .ok_or(ApiError::Unauthorized)
    }
}
