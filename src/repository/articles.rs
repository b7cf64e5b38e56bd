use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::types::{Article, ArticlePage, Category};

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// All articles whose category is in `filter`, or every article when
    /// `filter` is `None`. Catalogue order is preserved.
    async fn list(&self, filter: Option<&BTreeSet<Category>>) -> Vec<Article>;

    async fn get(&self, id: u64) -> Option<Article>;
}

/// Vec-backed article catalogue.
pub struct InMemoryArticleRepository {
    articles: RwLock<Vec<Article>>,
}

impl InMemoryArticleRepository {
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            articles: RwLock::new(articles),
        }
    }

    pub fn with_demo_articles() -> Self {
        Self::new(super::demo_articles())
    }
}

#[async_trait]
impl ArticleRepository for InMemoryArticleRepository {
    async fn list(&self, filter: Option<&BTreeSet<Category>>) -> Vec<Article> {
        let articles = self.articles.read().await;
        match filter {
            Some(categories) => articles
                .iter()
                .filter(|a| categories.contains(&a.category))
                .cloned()
                .collect(),
            None => articles.clone(),
        }
    }

    async fn get(&self, id: u64) -> Option<Article> {
        self.articles.read().await.iter().find(|a| a.id == id).cloned()
    }
}

// ============================================================================
// Pagination
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("Page size must be at least 1")]
    ZeroLimit,

    #[error("Page numbers start at 1")]
    ZeroPage,

    #[error("Page {page} is out of range ({total_pages} pages available)")]
    OutOfRange { page: u32, total_pages: u32 },
}

/// Slice one page out of an already-filtered collection.
///
/// `total_pages` is `ceil(len / limit)`, so an empty collection has zero
/// pages. Page 1 is always valid and is simply empty in that case; any other
/// page past the last one is rejected.
pub fn paginate(articles: &[Article], page: u32, limit: u32) -> Result<ArticlePage, PageError> {
    if limit == 0 {
        return Err(PageError::ZeroLimit);
    }
    if page == 0 {
        return Err(PageError::ZeroPage);
    }

    let total = articles.len();
    let limit_usize = limit as usize;
    let total_pages = u32::try_from(total.div_ceil(limit_usize)).unwrap_or(u32::MAX);

    if page > total_pages.max(1) {
        return Err(PageError::OutOfRange { page, total_pages });
    }

    let start = (page as usize - 1).saturating_mul(limit_usize).min(total);
    let end = start.saturating_add(limit_usize).min(total);

    Ok(ArticlePage {
        articles: articles[start..end].to_vec(),
        total_pages,
    })
}
