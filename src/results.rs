//! The infinite-scroll bookmark list.
//!
//! [`ResultListController`] runs a three state machine:
//!
//! ```text
//!            reset()                 page 1 ok / err
//!   * ──────────────> LoadingInitial ────────────────> Idle
//!   Idle ──load_more()──> LoadingMore ──page ok / err──> Idle
//! ```
//!
//! `load_more` only leaves `Idle`, so at most one page request is ever outstanding and pages are
//! appended in the order they were requested. A `reset` while a page is in flight starts a new
//! generation; the stale completion is then discarded instead of being appended to the new list.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    actions::BookmarkAction,
    config::FacetConfig,
    event::{Event, EventSink},
    flight::Generation,
    query::{FilterQuery, ListKind},
    source::{BookmarkSource, PagedFetcher},
    FacetError,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListState {
    #[default]
    Idle,
    LoadingInitial,
    LoadingMore,
}

/// Scroll position reported by the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_y: f64,
    pub inner_height: f64,
    pub document_height: f64,
}

impl Viewport {
    /// True once the bottom of the viewport is within `threshold` of the end of the document,
    /// so the next page starts loading before the user actually reaches it.
    pub fn near_bottom(&self, threshold: f64) -> bool {
        self.scroll_y + self.inner_height >= self.document_height - threshold
    }
}

#[derive(Debug, Default)]
struct ResultList {
    state: ListState,
    items: Vec<Bookmark>,
    total: u64,
    next: Option<String>,
    kind: ListKind,
}

pub struct ResultListController<S> {
    fetcher: PagedFetcher<S>,
    list: Mutex<ResultList>,
    generation: Generation,
    scroll_threshold: f64,
    events: EventSink,
}

impl<S: BookmarkSource> ResultListController<S> {
    pub fn new(source: Arc<S>, config: &FacetConfig, events: EventSink) -> Self {
        ResultListController {
            fetcher: PagedFetcher::new(source),
            list: Mutex::new(ResultList::default()),
            generation: Generation::default(),
            scroll_threshold: config.scroll_threshold,
            events,
        }
    }

    pub fn state(&self) -> ListState {
        self.list.lock().state
    }

    pub fn items(&self) -> Vec<Bookmark> {
        self.list.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.list.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.lock().items.is_empty()
    }

    /// Total reported by the first page.
    pub fn total_count(&self) -> u64 {
        self.list.lock().total
    }

    pub fn has_more(&self) -> bool {
        self.list.lock().next.is_some()
    }

    pub fn list_kind(&self) -> ListKind {
        self.list.lock().kind
    }

    /// Drops the current list and loads the first page of `kind` filtered by `query`.
    #[tracing::instrument(skip(self, query))]
    pub async fn reset(&self, query: &FilterQuery, kind: ListKind) -> Result<(), FacetError> {
        let generation = self.generation.advance();
        {
            let mut list = self.list.lock();
            *list = ResultList {
                state: ListState::LoadingInitial,
                kind,
                ..Default::default()
            };
        }
        let page = self.fetcher.first_page::<Bookmark>(kind.path(), query).await;

        let mut list = self.list.lock();
        if !self.generation.is_current(generation) {
            tracing::debug!("Discarding first page of a superseded {kind} list");
            return Ok(());
        }
        list.state = ListState::Idle;
        match page {
            Ok(page) => {
                list.items = page.items;
                list.total = page.total_count;
                list.next = page.next_page_token;
                let (count, total) = (list.items.len(), list.total);
                drop(list);
                self.events.emit(Event::ResultsLoaded { count, total });
                Ok(())
            }
            Err(err) => {
                drop(list);
                self.events.surface(&err);
                Err(err)
            }
        }
    }

    /// Appends the next page. Returns `Ok(false)` when the list is exhausted or a fetch is
    /// already outstanding.
    #[tracing::instrument(skip(self))]
    pub async fn load_more(&self) -> Result<bool, FacetError> {
        let (token, generation) = {
            let mut list = self.list.lock();
            if list.state != ListState::Idle {
                tracing::debug!("Ignoring load_more while {:?}", list.state);
                return Ok(false);
            }
            let Some(token) = list.next.clone() else {
                return Ok(false);
            };
            list.state = ListState::LoadingMore;
            (token, self.generation.current())
        };
        let page = self.fetcher.next_page::<Bookmark>(&token).await;

        let mut list = self.list.lock();
        if !self.generation.is_current(generation) {
            tracing::debug!("Discarding page of a superseded list");
            return Ok(false);
        }
        list.state = ListState::Idle;
        match page {
            Ok(page) => {
                list.items.extend(page.items);
                list.next = page.next_page_token;
                let (count, total) = (list.items.len(), list.total);
                drop(list);
                self.events.emit(Event::ResultsLoaded { count, total });
                Ok(true)
            }
            Err(err) => {
                drop(list);
                self.events.surface(&err);
                Err(err)
            }
        }
    }

    /// Scroll listener: requests the next page once the viewport nears the end of the document.
    pub async fn on_scroll(&self, viewport: Viewport) -> Result<bool, FacetError> {
        if viewport.near_bottom(self.scroll_threshold) {
            self.load_more().await
        } else {
            Ok(false)
        }
    }

    /// Sends `action` for bookmark `id` and mirrors its effect on the loaded list.
    #[tracing::instrument(skip(self))]
    pub async fn apply_action(&self, id: i64, action: BookmarkAction) -> Result<(), FacetError> {
        if let Err(err) = self
            .fetcher
            .source()
            .send(action.method(), &action.path(id), action.body())
            .await
        {
            self.events.surface(&err);
            return Err(err);
        }
        let mut list = self.list.lock();
        let kind = list.kind;
        if action.removes_from(kind) {
            let before = list.items.len();
            list.items.retain(|bookmark| bookmark.id != id);
            if list.items.len() < before {
                list.total = list.total.saturating_sub(1);
            }
        } else if let BookmarkAction::Favorite(favorite) = action {
            if let Some(bookmark) = list.items.iter_mut().find(|bookmark| bookmark.id == id) {
                bookmark.favorite = favorite;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{bookmark_page, ScriptedSource};

    const LIST: &str = "/bm/bookmark/list/";

    fn controller(source: &Arc<ScriptedSource>) -> ResultListController<ScriptedSource> {
        ResultListController::new(source.clone(), &FacetConfig::default(), EventSink::detached())
    }

    #[test]
    fn test_near_bottom() {
        let viewport = Viewport {
            scroll_y: 1300.0,
            inner_height: 800.0,
            document_height: 2800.0,
        };
        assert!(viewport.near_bottom(700.0));
        assert!(!viewport.near_bottom(699.0));
    }

    #[tokio::test]
    async fn test_reset_then_pages() {
        let source = Arc::new(ScriptedSource::default());
        source.respond(
            "/bm/bookmark/favorite-list/?topics=3",
            bookmark_page(&[1, 2], 3, Some("https://h/bm/bookmark/favorite-list/?page=2&topics=3")),
        );
        source.respond(
            "/bm/bookmark/favorite-list/?page=2&topics=3",
            bookmark_page(&[3], 99, None),
        );
        let results = controller(&source);

        results
            .reset(&FilterQuery::parse("topics=3"), ListKind::Favorite)
            .await
            .unwrap();
        assert_eq!(results.state(), ListState::Idle);
        assert_eq!(results.total_count(), 3);
        assert!(results.load_more().await.unwrap());
        assert_eq!(
            results.items().iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        // the total is only taken from the first page
        assert_eq!(results.total_count(), 3);
        assert!(!results.has_more());
        assert!(!results.load_more().await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_load_more_fetches_once() {
        let source = Arc::new(ScriptedSource::default());
        source.respond(LIST, bookmark_page(&[1], 2, Some("/bm/bookmark/list/?page=2")));
        source.respond("/bm/bookmark/list/?page=2", bookmark_page(&[2], 2, None));
        let results = controller(&source);
        results.reset(&FilterQuery::new(), ListKind::All).await.unwrap();

        source.hold();
        let (first, second) = tokio::join!(results.load_more(), async {
            tokio::task::yield_now().await;
            assert_eq!(results.state(), ListState::LoadingMore);
            let dropped = results.load_more().await;
            source.release();
            dropped
        });
        assert!(first.unwrap());
        assert!(!second.unwrap());
        assert_eq!(
            results.items().iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_reset_discards_stale_page() {
        let source = Arc::new(ScriptedSource::default());
        source.respond(LIST, bookmark_page(&[1], 1, Some("/bm/bookmark/list/?page=2")));
        source.respond("/bm/bookmark/list/?page=2", bookmark_page(&[2], 1, None));
        source.respond("/bm/bookmark/list/?q=x", bookmark_page(&[7], 1, None));
        let results = controller(&source);
        results.reset(&FilterQuery::new(), ListKind::All).await.unwrap();

        source.hold();
        let (stale, _) = tokio::join!(results.load_more(), async {
            tokio::task::yield_now().await;
            source.release();
            results
                .reset(&FilterQuery::parse("q=x"), ListKind::All)
                .await
                .unwrap();
        });
        assert!(!stale.unwrap());
        assert_eq!(
            results.items().iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![7]
        );
        assert_eq!(results.state(), ListState::Idle);
    }

    #[tokio::test]
    async fn test_failed_load_more_returns_to_idle() {
        let source = Arc::new(ScriptedSource::default());
        source.respond(LIST, bookmark_page(&[1], 2, Some("/bm/bookmark/list/?page=2")));
        source.fail("/bm/bookmark/list/?page=2", FacetError::Network("502".to_string()));
        let results = controller(&source);
        results.reset(&FilterQuery::new(), ListKind::All).await.unwrap();

        assert!(results.load_more().await.is_err());
        assert_eq!(results.state(), ListState::Idle);
        assert!(results.has_more());
    }

    #[tokio::test]
    async fn test_scroll_trigger() {
        let source = Arc::new(ScriptedSource::default());
        source.respond(LIST, bookmark_page(&[1], 2, Some("/bm/bookmark/list/?page=2")));
        source.respond("/bm/bookmark/list/?page=2", bookmark_page(&[2], 2, None));
        let results = controller(&source);
        results.reset(&FilterQuery::new(), ListKind::All).await.unwrap();

        let far = Viewport {
            scroll_y: 0.0,
            inner_height: 500.0,
            document_height: 5000.0,
        };
        assert!(!results.on_scroll(far).await.unwrap());
        let near = Viewport {
            scroll_y: 3900.0,
            ..far
        };
        assert!(results.on_scroll(near).await.unwrap());
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_apply_action_updates_list() {
        let source = Arc::new(ScriptedSource::default());
        source.respond(LIST, bookmark_page(&[1, 2, 3], 3, None));
        let results = controller(&source);
        results.reset(&FilterQuery::new(), ListKind::All).await.unwrap();

        results.apply_action(2, BookmarkAction::Archive).await.unwrap();
        assert_eq!(
            results.items().iter().map(|b| b.id).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(results.total_count(), 2);

        results
            .apply_action(3, BookmarkAction::Favorite(true))
            .await
            .unwrap();
        assert!(results.items()[1].favorite);
        assert_eq!(
            source.sent(),
            vec![
                (http::Method::PATCH, "/bm/bookmark/2/".to_string()),
                (http::Method::PATCH, "/bm/bookmark/3/".to_string()),
            ]
        );
    }
}
