//! Remote data access.
//!
//! [`BookmarkSource`] is the transport seam: it resolves a path (with its query string already
//! attached) to a decoded JSON document. Everything above it only deals in paths, so a real HTTP
//! client, a browser `fetch` bridge and the scripted fakes used in tests are interchangeable.
//!
//! [`PagedFetcher`] layers the paginated `{count, next, results}` contract on top of it.

use std::{future::Future, sync::Arc};

use http::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use crate::{query::FilterQuery, FacetError};

pub trait BookmarkSource: Send + Sync {
    /// GET `path` and return the decoded body.
    ///
    /// Implementations map a non-success status with [`FacetError::from_status`], so a 401
    /// surfaces as [`FacetError::AuthExpired`].
    fn get(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<serde_json::Value, FacetError>> + Send;

    /// Issue a state-changing request. Returns `None` for an empty (204) response.
    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, FacetError>> + Send {
        let msg = format!("{method} {path} is not supported by this source");
        tracing::warn!("{msg} (body: {body:?})");
        async move { Err(FacetError::Custom(msg)) }
    }
}

/// One page of a paginated resource.
///
/// `next_page_token` is an opaque continuation path; `None` means the resource is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(rename = "results")]
    pub items: Vec<T>,
    #[serde(rename = "next", default)]
    pub next_page_token: Option<String>,
    #[serde(rename = "count", default)]
    pub total_count: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Page {
            items: Vec::new(),
            next_page_token: None,
            total_count: 0,
        }
    }
}

/// Reduces an absolute `next` link to `path?query`, so it can be replayed through the same
/// transport. Relative links are returned unchanged.
pub fn continuation_path(next: &str) -> String {
    match Url::parse(next) {
        Ok(url) => match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        },
        Err(_) => next.to_string(),
    }
}

#[derive(Debug)]
pub struct PagedFetcher<S> {
    source: Arc<S>,
}

impl<S> Clone for PagedFetcher<S> {
    fn clone(&self) -> Self {
        PagedFetcher {
            source: self.source.clone(),
        }
    }
}

impl<S: BookmarkSource> PagedFetcher<S> {
    pub fn new(source: Arc<S>) -> Self {
        PagedFetcher { source }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// First page of `path` filtered by `query`.
    pub async fn first_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &FilterQuery,
    ) -> Result<Page<T>, FacetError> {
        self.fetch_page(&query.to_path(path)).await
    }

    /// Follows a continuation token returned by a previous page.
    pub async fn next_page<T: DeserializeOwned>(&self, token: &str) -> Result<Page<T>, FacetError> {
        self.fetch_page(token).await
    }

    /// A non-paginated resource returning a bare JSON array.
    pub async fn fetch_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &FilterQuery,
    ) -> Result<Vec<T>, FacetError> {
        let target = query.to_path(path);
        tracing::debug!("Fetching list {target}");
        let body = self.source.get(&target).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn fetch_page<T: DeserializeOwned>(&self, target: &str) -> Result<Page<T>, FacetError> {
        tracing::debug!("Fetching page {target}");
        let body = self.source.get(target).await?;
        let mut page: Page<T> = serde_json::from_value(body)?;
        page.next_page_token = page.next_page_token.as_deref().map(continuation_path);
        Ok(page)
    }
}
