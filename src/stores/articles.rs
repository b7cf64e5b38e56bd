use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::api::NewsApi;
use crate::types::{Article, ArticleListState, Category, PaginationRequest};

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArticleError {
    /// Catch-all for any backend failure while loading articles.
    #[error("Failed to fetch news: {0}")]
    FetchFailed(String),
}

/// The current page of the article list and the actions that move it.
///
/// Fetch failures never propagate as errors: they land in
/// [`ArticleListState::error`] and the previously loaded articles stay in
/// place until the next successful fetch.
///
/// Only the most recently started fetch may commit. A response that arrives
/// after a newer fetch began is dropped, and `loading` stays set until the
/// newest fetch completes.
pub struct ArticleStore {
    api: Arc<dyn NewsApi>,
    page_size: u32,
    state: watch::Sender<ArticleListState>,
    // Sequence number of the newest fetch; bumped only while the channel is
    // locked for writing.
    latest: AtomicU64,
}

impl ArticleStore {
    pub fn new(api: Arc<dyn NewsApi>) -> Self {
        Self::with_page_size(api, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(api: Arc<dyn NewsApi>, page_size: u32) -> Self {
        Self {
            api,
            page_size,
            state: watch::Sender::new(ArticleListState::default()),
            latest: AtomicU64::new(0),
        }
    }

    // ========================================================================
    // Getters
    // ========================================================================

    pub fn state(&self) -> ArticleListState {
        self.state.borrow().clone()
    }

    pub fn articles(&self) -> Vec<Article> {
        self.state.borrow().articles.clone()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn has_next_page(&self) -> bool {
        self.state.borrow().has_next_page()
    }

    pub fn has_previous_page(&self) -> bool {
        self.state.borrow().has_previous_page()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn has_error(&self) -> bool {
        self.state.borrow().error.is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<ArticleListState> {
        self.state.subscribe()
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Load one page. Returns whether its result was committed: `false` on
    /// failure, or when a newer fetch superseded it.
    pub async fn fetch_page(&self, request: PaginationRequest) -> bool {
        let mut seq = 0;
        self.state.send_modify(|s| {
            seq = self.begin();
            s.loading = true;
            s.error = None;
        });
        self.complete_fetch(request, seq).await
    }

    /// Advance one page if there is one and nothing is loading.
    ///
    /// Returns whether a fetch was issued.
    pub async fn next_page(&self, categories: Option<BTreeSet<Category>>) -> bool {
        self.step(1, categories).await
    }

    /// Go back one page if not on the first page and nothing is loading.
    ///
    /// Returns whether a fetch was issued.
    pub async fn previous_page(&self, categories: Option<BTreeSet<Category>>) -> bool {
        self.step(-1, categories).await
    }

    /// Reload from the first page.
    pub async fn refresh(&self, categories: Option<BTreeSet<Category>>) -> bool {
        self.fetch_page(PaginationRequest::new(1, self.page_size).with_categories(categories))
            .await
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.error.take().is_some());
    }

    /// Look up a single article without touching the list state.
    pub async fn article(&self, id: u64) -> Result<Article, ArticleError> {
        self.api
            .get_news_by_id(id)
            .await
            .map(|response| response.data)
            .map_err(|e| ArticleError::FetchFailed(e.to_string()))
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    async fn step(&self, delta: i8, categories: Option<BTreeSet<Category>>) -> bool {
        let mut target = None;
        let mut seq = 0;

        // Check and claim the loading flag in one critical section so two
        // callers cannot both start a fetch.
        self.state.send_if_modified(|s| {
            let allowed = match delta {
                1 => s.has_next_page(),
                _ => s.has_previous_page(),
            };
            if !allowed || s.loading {
                return false;
            }
            target = Some(if delta > 0 {
                s.current_page + 1
            } else {
                s.current_page - 1
            });
            seq = self.begin();
            s.loading = true;
            s.error = None;
            true
        });

        let Some(page) = target else {
            tracing::debug!(delta, "Page navigation ignored");
            return false;
        };

        self.complete_fetch(
            PaginationRequest::new(page, self.page_size).with_categories(categories),
            seq,
        )
        .await;
        true
    }

    /// Claim the next sequence number. Call only inside a `send_*` closure.
    fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn is_latest(&self, seq: u64) -> bool {
        self.latest.load(Ordering::Acquire) == seq
    }

    /// Second half of a fetch; the loading flag is already set.
    async fn complete_fetch(&self, request: PaginationRequest, seq: u64) -> bool {
        let result = match self.api.get_news(&request).await {
            Ok(response) => {
                let page = response.data;
                if page.total_pages > 0 && request.page > page.total_pages {
                    Err(ArticleError::FetchFailed(format!(
                        "page {} is past the last page ({})",
                        request.page, page.total_pages
                    )))
                } else {
                    Ok(page)
                }
            }
            Err(e) => Err(ArticleError::FetchFailed(e.to_string())),
        };

        let succeeded = result.is_ok();
        let committed = self.state.send_if_modified(|s| {
            if !self.is_latest(seq) {
                return false;
            }
            match result {
                Ok(page) => {
                    tracing::debug!(
                        page = request.page,
                        total_pages = page.total_pages,
                        count = page.articles.len(),
                        "Loaded article page"
                    );
                    s.articles = page.articles;
                    s.current_page = request.page;
                    s.total_pages = page.total_pages;
                }
                Err(e) => {
                    tracing::warn!(page = request.page, error = %e, "Article fetch failed");
                    s.error = Some(e.to_string());
                }
            }
            s.loading = false;
            true
        });

        if !committed {
            tracing::debug!(page = request.page, seq, "Dropping superseded article response");
        }
        committed && succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Latency, RepositoryApi};
    use std::time::Duration;

    fn store() -> ArticleStore {
        ArticleStore::new(Arc::new(RepositoryApi::with_demo_data(Latency::NONE)))
    }

    fn only(category: Category) -> Option<BTreeSet<Category>> {
        Some(BTreeSet::from([category]))
    }

    #[tokio::test]
    async fn test_fetch_first_and_second_page() {
        let store = store();

        assert!(store.fetch_page(PaginationRequest::new(1, 6)).await);
        let state = store.state();
        assert_eq!(state.articles.len(), 6);
        assert_eq!(state.total_pages, 2);
        assert_eq!(state.current_page, 1);
        assert!(!state.loading);

        assert!(store.fetch_page(PaginationRequest::new(2, 6)).await);
        assert_eq!(store.articles().len(), 4);
        assert!(!store.has_next_page());
        assert!(store.has_previous_page());
    }

    #[tokio::test]
    async fn test_filtered_total_pages() {
        let store = store();
        store
            .fetch_page(PaginationRequest::new(1, 6).with_categories(only(Category::Technology)))
            .await;

        let state = store.state();
        assert_eq!(state.total_pages, 1);
        assert_eq!(state.articles.len(), 2);
        assert!(state
            .articles
            .iter()
            .all(|a| a.category == Category::Technology));
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_articles() {
        let store = store();
        store.refresh(None).await;
        let before = store.articles();

        assert!(!store.fetch_page(PaginationRequest::new(1, 0)).await);

        let state = store.state();
        assert!(!state.loading);
        assert_eq!(state.articles, before);
        assert!(state.error.as_deref().unwrap().starts_with("Failed to fetch news"));
        assert!(store.has_error());

        store.clear_error();
        assert!(!store.has_error());
    }

    #[tokio::test]
    async fn test_next_and_previous_page() {
        let store = store();
        store.refresh(None).await;

        assert!(store.next_page(None).await);
        assert_eq!(store.state().current_page, 2);

        assert!(!store.next_page(None).await);
        assert_eq!(store.state().current_page, 2);

        assert!(store.previous_page(None).await);
        assert_eq!(store.state().current_page, 1);
        assert!(!store.previous_page(None).await);
    }

    #[tokio::test]
    async fn test_refresh_resets_to_first_page() {
        let store = store();
        store.refresh(None).await;
        store.next_page(None).await;

        store.refresh(only(Category::Sports)).await;
        let state = store.state();
        assert_eq!(state.current_page, 1);
        assert_eq!(state.total_pages, 1);
        assert_eq!(state.articles.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_filter_result_is_valid_page() {
        let store = ArticleStore::new(Arc::new(RepositoryApi::new(
            Arc::new(crate::repository::InMemoryUserRepository::new(Vec::new())),
            Arc::new(crate::repository::InMemoryArticleRepository::new(Vec::new())),
            Latency::NONE,
        )));

        assert!(store.refresh(None).await);
        let state = store.state();
        assert!(state.articles.is_empty());
        assert_eq!(state.total_pages, 0);
        assert!(state.error.is_none());
        assert!(!store.next_page(None).await);
    }

    #[tokio::test]
    async fn test_article_lookup() {
        let store = store();
        assert_eq!(store.article(3).await.unwrap().category, Category::Politics);
        assert!(matches!(
            store.article(300).await,
            Err(ArticleError::FetchFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_page_ignored_while_loading() {
        let store = ArticleStore::new(Arc::new(RepositoryApi::with_demo_data(
            Latency::from_millis(800),
        )));
        store.refresh(None).await;

        let (first, second) = tokio::join!(store.next_page(None), store.next_page(None));
        assert!(first);
        assert!(!second);
        assert_eq!(store.state().current_page, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_fetch_does_not_commit() {
        let store = ArticleStore::new(Arc::new(RepositoryApi::with_demo_data(
            Latency::from_millis(800),
        )));
        store.refresh(None).await;

        let late_refresh = async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            store.refresh(None).await
        };
        let midway = async {
            tokio::time::sleep(Duration::from_millis(850)).await;
            store.state()
        };
        let (stepped, refreshed, mid) = tokio::join!(store.next_page(None), late_refresh, midway);

        // The page-2 response landed first but the refresh had already begun.
        assert!(stepped);
        assert!(mid.loading);
        assert_eq!(mid.current_page, 1);

        assert!(refreshed);
        let state = store.state();
        assert!(!state.loading);
        assert_eq!(state.current_page, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_fetch_reports_false() {
        let store = ArticleStore::new(Arc::new(RepositoryApi::with_demo_data(
            Latency::from_millis(800),
        )));

        let later = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            store
                .fetch_page(PaginationRequest::new(1, 6).with_categories(only(Category::Sports)))
                .await
        };
        let (first, second) = tokio::join!(store.fetch_page(PaginationRequest::new(2, 6)), later);

        assert!(!first);
        assert!(second);
        let state = store.state();
        assert_eq!(state.current_page, 1);
        assert_eq!(state.total_pages, 1);
        assert!(state.articles.iter().all(|a| a.category == Category::Sports));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_flag_visible_to_subscribers() {
        let store = ArticleStore::new(Arc::new(RepositoryApi::with_demo_data(
            Latency::from_millis(800),
        )));
        let mut rx = store.subscribe();

        let fetch = store.refresh(None);
        tokio::pin!(fetch);

        tokio::select! {
            _ = &mut fetch => panic!("fetch finished before latency elapsed"),
            changed = rx.changed() => {
                changed.unwrap();
                assert!(rx.borrow_and_update().loading);
            }
        }

        assert!(fetch.await);
        assert!(!store.is_loading());
    }
}
