//! State containers driven by user actions.
//!
//! Each store owns its state exclusively and publishes every committed
//! change through a `tokio::sync::watch` channel. Callers read the current
//! value with the getters or follow changes with `subscribe()`:
//!
//! ```ignore
//! let mut rx = articles.subscribe();
//! articles.refresh(None).await;
//! let state = rx.borrow_and_update().clone();
//! ```
//!
//! Actions take `&self`, so a store can be shared (e.g. in an `Arc`) between
//! the pieces of UI that drive it. The session store rejects a second
//! account request while one is pending. The article store ignores page
//! navigation while loading, and when fetches overlap only the most recently
//! started one commits.

mod articles;
mod session;

pub use articles::{ArticleError, ArticleStore, DEFAULT_PAGE_SIZE};
pub use session::{SessionError, SessionStore, DEFAULT_SESSION_KEY};
