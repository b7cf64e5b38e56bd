use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use secrecy::ExposeSecret;
use std::collections::BTreeSet;
use url::Url;

use super::{token_for, ApiError, ApiResult, Latency, NewsApi};
use crate::types::{
    default_categories, ApiResponse, Article, ArticlePage, AuthPayload, Category,
    LoginCredentials, PaginationRequest, ProfileUpdate, RegisterCredentials, User,
};

/// Email that always reports as already registered.
pub const TAKEN_EMAIL: &str = "test@example.com";
/// Username that always reports as already taken.
pub const TAKEN_USERNAME: &str = "demo";

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_PASSWORD: &str = "demo123";

/// Fixed-response backend.
///
/// Answers are deterministic and ignore any state: only the demo
/// credentials log in, [`TAKEN_EMAIL`] and [`TAKEN_USERNAME`] exercise the
/// conflict paths, and news listings are empty.
pub struct CannedApi {
    latency: Latency,
}

impl CannedApi {
    pub fn new(latency: Latency) -> Self {
        Self { latency }
    }

    fn demo_user(categories: BTreeSet<Category>) -> User {
        User {
            id: "1".to_string(),
            username: "demo".to_string(),
            email: DEMO_EMAIL.to_string(),
            selected_categories: categories,
            created_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).single().unwrap_or_default(),
        }
    }

    fn mock_user(categories: BTreeSet<Category>) -> User {
        User {
            id: "2".to_string(),
            username: "mockuser".to_string(),
            email: "mock@example.com".to_string(),
            ..Self::demo_user(categories)
        }
    }
}

impl Default for CannedApi {
    fn default() -> Self {
        Self::new(Latency::NONE)
    }
}

#[async_trait]
impl NewsApi for CannedApi {
    async fn login(&self, credentials: &LoginCredentials) -> ApiResult<AuthPayload> {
        self.latency.wait().await;

        if credentials.identifier == DEMO_EMAIL
            && credentials.password.expose_secret() == DEMO_PASSWORD
        {
            let user = Self::demo_user(BTreeSet::from([
                Category::Technology,
                Category::Sports,
                Category::Politics,
            ]));
            let token = token_for(&user.id);
            Ok(ApiResponse::ok(AuthPayload { user, token }))
        } else {
            Err(ApiError::InvalidCredentials)
        }
    }

    async fn register(&self, credentials: &RegisterCredentials) -> ApiResult<AuthPayload> {
        self.latency.wait().await;

        if credentials.email == TAKEN_EMAIL {
            return Err(ApiError::EmailTaken);
        }
        if credentials.username == TAKEN_USERNAME {
            return Err(ApiError::UsernameTaken);
        }

        let now = Utc::now();
        let user = User {
            id: now.timestamp_millis().to_string(),
            username: credentials.username.clone(),
            email: credentials.email.clone(),
            selected_categories: default_categories(),
            created_at: now,
        };
        let token = token_for(&user.id);
        Ok(ApiResponse::ok(AuthPayload { user, token }))
    }

    async fn logout(&self, _token: Option<&str>) -> ApiResult<()> {
        self.latency.wait().await;
        Ok(ApiResponse::ok(()))
    }

    async fn get_current_user(&self, _token: &str) -> ApiResult<User> {
        self.latency.wait().await;
        Ok(ApiResponse::ok(Self::demo_user(BTreeSet::from([
            Category::Technology,
            Category::Sports,
        ]))))
    }

    async fn get_news(&self, _request: &PaginationRequest) -> ApiResult<ArticlePage> {
        self.latency.wait().await;
        Ok(ApiResponse::ok(ArticlePage {
            articles: Vec::new(),
            total_pages: 1,
        }))
    }

    async fn get_news_by_id(&self, id: u64) -> ApiResult<Article> {
        self.latency.wait().await;
        let source_url = Url::parse("https://example.com")
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        Ok(ApiResponse::ok(Article {
            id,
            title: "Mock Article".to_string(),
            summary: "Mock summary".to_string(),
            category: Category::Technology,
            source_url,
            date: Utc::now(),
            image_url: None,
        }))
    }

    async fn get_categories(&self) -> ApiResult<Vec<Category>> {
        self.latency.wait().await;
        Ok(ApiResponse::ok(Category::ALL.to_vec()))
    }

    async fn update_profile(&self, _token: &str, update: ProfileUpdate) -> ApiResult<User> {
        self.latency.wait().await;
        Ok(ApiResponse::ok(Self::mock_user(
            update.selected_categories.unwrap_or_default(),
        )))
    }

    async fn update_categories(
        &self,
        _token: &str,
        categories: &BTreeSet<Category>,
    ) -> ApiResult<User> {
        self.latency.wait().await;
        Ok(ApiResponse::ok(Self::mock_user(categories.clone())))
    }
}
