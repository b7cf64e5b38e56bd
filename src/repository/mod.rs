//! Injected data sources backing the in-memory backend.
//!
//! - [`UserRepository`] - account records with their (mock, plaintext) passwords
//! - [`ArticleRepository`] - the article catalogue
//!
//! The in-memory implementations are seeded with the demo account and the
//! demo articles; a real data source implements the same traits.

mod articles;
mod seed;
mod users;

pub use articles::{paginate, ArticleRepository, InMemoryArticleRepository, PageError};
pub use seed::{demo_articles, demo_users, DEMO_EMAIL, DEMO_PASSWORD, DEMO_USERNAME};
pub use users::{Conflict, InMemoryUserRepository, NewUser, UserRepository, USERS_KEY};
