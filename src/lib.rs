//! Client-side state layer of a personalized news digest.
//!
//! - [`stores::SessionStore`] - sign-in state, registration, category choice
//! - [`stores::ArticleStore`] - the paginated, category-filtered article list
//! - [`router::Router`] - path routing with auth/guest guards
//! - [`api::NewsApi`] - the backend contract, with in-process stand-ins
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use news_digest::api::{Latency, RepositoryApi};
//! use news_digest::router::Router;
//! use news_digest::storage::MemoryStore;
//! use news_digest::stores::{ArticleStore, SessionStore};
//! use news_digest::types::LoginCredentials;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Arc::new(RepositoryApi::with_demo_data(Latency::NONE));
//! let session = SessionStore::new(api.clone(), Arc::new(MemoryStore::new()));
//! let articles = ArticleStore::new(api);
//!
//! session.login(&LoginCredentials::new("demo", "demo123")).await?;
//! articles.refresh(Some(session.user_categories())).await;
//!
//! let mut router = Router::default();
//! let nav = router.navigate("/settings", &session)?;
//! assert!(!nav.was_redirected());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod repository;
pub mod router;
pub mod storage;
pub mod stores;
pub mod types;
