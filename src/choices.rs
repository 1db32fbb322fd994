//! Facet choice lists for the filter panel.
//!
//! Each facet (websites, topics) has its own [`FilterChoiceSearcher`]: a paginated list of
//! choices, a debounced search and a scroll-driven `load_more`. A search *replaces* the list,
//! scrolling *extends* it.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use tokio::task::JoinHandle;

use crate::{
    config::FacetConfig,
    event::{Event, EventSink},
    flight::{Generation, InFlight},
    query::FilterQuery,
    source::{BookmarkSource, Page, PagedFetcher},
    FacetError,
};

/// A filterable dimension with its own choice list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facet {
    Website,
    Topic,
}

impl Facet {
    pub fn path(&self) -> &'static str {
        match self {
            Facet::Website => "/bm/filter/choices/website/",
            Facet::Topic => "/bm/filter/choices/topic/",
        }
    }

    pub fn include_key(&self) -> &'static str {
        match self {
            Facet::Website => "websites",
            Facet::Topic => "topics",
        }
    }

    pub fn exclude_key(&self) -> &'static str {
        match self {
            Facet::Website => "exclude_websites",
            Facet::Topic => "exclude_topics",
        }
    }

    /// Field of a choice object holding its human readable label.
    pub fn label_field(&self) -> &'static str {
        match self {
            Facet::Website => "domain",
            Facet::Topic => "name",
        }
    }

    pub fn search_param<'a>(&self, config: &'a FacetConfig) -> &'a str {
        match self {
            Facet::Website => &config.website_search_param,
            Facet::Topic => &config.topic_search_param,
        }
    }

    /// The query a choice request for this facet is sent with: this facet's own inclusion and
    /// exclusion keys are dropped so already-applied choices do not hide their siblings.
    pub fn scope(&self, base: &FilterQuery) -> FilterQuery {
        base.without(&[self.include_key(), self.exclude_key()])
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.include_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetChoice {
    pub id: i64,
    pub label: String,
}

impl FacetChoice {
    pub fn from_value(facet: Facet, value: &serde_json::Value) -> Result<FacetChoice, FacetError> {
        let id = value.get("id").and_then(serde_json::Value::as_i64).ok_or_else(|| {
            FacetError::Serialization(format!("{facet} choice without a numeric id: {value}"))
        })?;
        let label = match value.get(facet.label_field()) {
            Some(serde_json::Value::String(label)) => label.clone(),
            Some(other) => other.to_string(),
            None => id.to_string(),
        };
        Ok(FacetChoice { id, label })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceList {
    pub items: Vec<FacetChoice>,
    pub next_page_token: Option<String>,
}

/// The displayed list together with the generation of the request that installed it.
#[derive(Debug, Default)]
struct Installed {
    list: ChoiceList,
    generation: u64,
}

struct SearchShared<S> {
    facet: Facet,
    fetcher: PagedFetcher<S>,
    list: Mutex<Installed>,
    generation: Generation,
    loading: InFlight,
    events: EventSink,
}

impl<S: BookmarkSource> SearchShared<S> {
    fn decode(&self, page: Page<serde_json::Value>) -> Result<ChoiceList, FacetError> {
        let items = page
            .items
            .iter()
            .map(|value| FacetChoice::from_value(self.facet, value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChoiceList {
            items,
            next_page_token: page.next_page_token,
        })
    }

    /// Fetches the first page for `query` and installs it, unless a newer request started
    /// meanwhile.
    async fn replace(&self, query: FilterQuery, generation: u64) -> Result<(), FacetError> {
        let page = self
            .fetcher
            .first_page::<serde_json::Value>(self.facet.path(), &query)
            .await;
        if !self.generation.is_current(generation) {
            tracing::debug!("Discarding superseded {} choices", self.facet);
            return Ok(());
        }
        let fresh = self.decode(page?)?;
        let count = fresh.items.len();
        {
            let mut installed = self.list.lock();
            if !self.generation.is_current(generation) {
                tracing::debug!("Discarding superseded {} choices", self.facet);
                return Ok(());
            }
            *installed = Installed {
                list: fresh,
                generation,
            };
        }
        self.events.emit(Event::ChoicesLoaded {
            facet: self.facet,
            count,
        });
        Ok(())
    }
}

pub struct FilterChoiceSearcher<S> {
    shared: Arc<SearchShared<S>>,
    search_param: String,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<S: BookmarkSource + 'static> FilterChoiceSearcher<S> {
    pub fn new(facet: Facet, source: Arc<S>, config: &FacetConfig, events: EventSink) -> Self {
        FilterChoiceSearcher {
            shared: Arc::new(SearchShared {
                facet,
                fetcher: PagedFetcher::new(source),
                list: Mutex::new(Installed::default()),
                generation: Generation::default(),
                loading: InFlight::new("choice page"),
                events,
            }),
            search_param: facet.search_param(config).to_string(),
            debounce: config.search_debounce(),
            pending: Mutex::new(None),
        }
    }

    pub fn facet(&self) -> Facet {
        self.shared.facet
    }

    pub fn choices(&self) -> Vec<FacetChoice> {
        self.shared.list.lock().list.items.clone()
    }

    pub fn list(&self) -> ChoiceList {
        self.shared.list.lock().list.clone()
    }

    pub fn has_more(&self) -> bool {
        self.shared.list.lock().list.next_page_token.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.loading.is_busy()
    }

    /// True while a debounced search is waiting for its quiet period or its response.
    pub fn has_pending_search(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    fn cancel_pending(&self) {
        if let Some(task) = self.pending.lock().take() {
            if !task.is_finished() {
                tracing::debug!("Cancelling pending {} search", self.shared.facet);
            }
            task.abort();
        }
    }

    /// Loads the first page right away (the filter panel was opened or the filters changed).
    #[tracing::instrument(skip(self, base), fields(facet = %self.shared.facet))]
    pub async fn open(&self, base: &FilterQuery) -> Result<(), FacetError> {
        self.cancel_pending();
        let generation = self.shared.generation.advance();
        let result = self
            .shared
            .replace(self.shared.facet.scope(base), generation)
            .await;
        if let Err(err) = &result {
            self.shared.events.surface(err);
        }
        result
    }

    /// Forgets the list and any pending search.
    pub fn close(&self) {
        self.cancel_pending();
        let mut installed = self.shared.list.lock();
        *installed = Installed {
            list: ChoiceList::default(),
            generation: self.shared.generation.advance(),
        };
    }

    /// Schedules a search for `text` after the quiet period, cancelling the previous one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn search(&self, base: &FilterQuery, text: &str) {
        self.cancel_pending();
        let scoped = self.shared.facet.scope(base);
        // an empty search lists everything, same as no search parameter
        let query = if text.is_empty() {
            scoped
        } else {
            scoped.with(&self.search_param, text)
        };
        let generation = self.shared.generation.advance();
        let shared = self.shared.clone();
        let debounce = self.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Err(err) = shared.replace(query, generation).await {
                shared.events.surface(&err);
            }
        });
        *self.pending.lock() = Some(task);
    }

    /// Appends the next page. Returns `Ok(false)` when there is nothing to load, a page is
    /// already being loaded, or the list was replaced while the page was in flight.
    #[tracing::instrument(skip(self), fields(facet = %self.shared.facet))]
    pub async fn load_more(&self) -> Result<bool, FacetError> {
        let (token, generation) = {
            let installed = self.shared.list.lock();
            let Some(token) = installed.list.next_page_token.clone() else {
                return Ok(false);
            };
            (token, installed.generation)
        };
        let Some(_guard) = self.shared.loading.try_begin() else {
            return Ok(false);
        };
        let page = match self
            .shared
            .fetcher
            .next_page::<serde_json::Value>(&token)
            .await
            .and_then(|page| self.shared.decode(page))
        {
            Ok(page) => page,
            Err(err) => {
                self.shared.events.surface(&err);
                return Err(err);
            }
        };
        let count = {
            let mut installed = self.shared.list.lock();
            if installed.generation != generation {
                tracing::debug!("Discarding page for a superseded choice list");
                return Ok(false);
            }
            installed.list.items.extend(page.items);
            installed.list.next_page_token = page.next_page_token;
            installed.list.items.len()
        };
        self.shared.events.emit(Event::ChoicesLoaded {
            facet: self.shared.facet,
            count,
        });
        Ok(true)
    }
}

impl<S> Drop for FilterChoiceSearcher<S> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }
}
