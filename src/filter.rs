//! Filter state hub.
//!
//! [`FilterStateController`] owns the dashboard's [`UrlQuery`] and is the only place it is
//! mutated. Every published mutation writes the new query string to the [`AddressBar`] (a
//! history *replace*, never a navigation) and recomputes the applied-filter chips before the
//! call returns, so whoever reacts to the returned [`FilterChange`] never sees a stale URL.
//!
//! Mutations made with [`Propagation::Silent`] only touch the in-memory state. They are carried
//! along by the next published mutation, which lets a caller batch several edits into a single
//! reload.

use parking_lot::Mutex;
use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{
    choices::{Facet, FacetChoice},
    event::{Event, EventSink},
    query::{
        humanize, AppliedFilter, FilterQuery, ListKind, MetaData, UrlQuery, EXCLUDE_NODE_KEY,
        META_DATA_KEY, NODE_KEY, SIDEBAR_KEY,
    },
};

/// The browser address bar, reduced to what the dashboard needs from it.
pub trait AddressBar: Send + Sync {
    /// Current query string, with or without the leading `?`.
    fn query(&self) -> String;

    /// Replace the current history entry's query string without reloading the page.
    fn replace_query(&self, query: &str);
}

/// In-process address bar used natively and in tests.
#[derive(Debug, Default)]
pub struct MemoryAddressBar {
    query: Mutex<String>,
    replacements: AtomicUsize,
}

impl MemoryAddressBar {
    pub fn new<S: Into<String>>(query: S) -> Self {
        MemoryAddressBar {
            query: Mutex::new(query.into()),
            replacements: AtomicUsize::new(0),
        }
    }

    /// How many times the query was replaced.
    pub fn replacements(&self) -> usize {
        self.replacements.load(Ordering::Acquire)
    }
}

impl AddressBar for MemoryAddressBar {
    fn query(&self) -> String {
        self.query.lock().clone()
    }

    fn replace_query(&self, query: &str) {
        *self.query.lock() = format!("?{query}");
        self.replacements.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Propagation {
    /// Persist to the address bar and report the change.
    #[default]
    Publish,
    /// Only update the in-memory state; the next published mutation carries it along.
    Silent,
}

/// Result of a filter mutation, interpreted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    /// Nothing changed and nothing was pending.
    Unchanged,
    /// The in-memory state changed but was not published.
    Staged,
    /// The address bar was updated; `keys` changed since the previous publish.
    Published { keys: BTreeSet<String> },
}

impl FilterChange {
    pub fn is_published(&self) -> bool {
        matches!(self, FilterChange::Published { .. })
    }

    /// True when the result list has to be reloaded.
    pub fn needs_reload(&self) -> bool {
        self.is_published()
    }

    /// True when a key other than the graph node selection (or the display-only side channel)
    /// changed, i.e. the hierarchy graph has to be rebuilt.
    pub fn affects_graph_scope(&self) -> bool {
        match self {
            FilterChange::Published { keys } => keys.iter().any(|key| {
                ![NODE_KEY, EXCLUDE_NODE_KEY, META_DATA_KEY, SIDEBAR_KEY].contains(&key.as_str())
            }),
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct FilterState {
    url: UrlQuery,
    applied: Vec<AppliedFilter>,
    pending: BTreeSet<String>,
}

pub struct FilterStateController<A> {
    address: Arc<A>,
    state: Mutex<FilterState>,
    events: EventSink,
}

impl<A: AddressBar> FilterStateController<A> {
    /// Seeds the state from the address bar's current query.
    pub fn new(address: Arc<A>, events: EventSink) -> Self {
        let url = UrlQuery::parse(&address.query());
        let applied = url.applied_filters();
        tracing::debug!(
            "Filter state initialized with {} applied filters",
            applied.len()
        );
        FilterStateController {
            address,
            state: Mutex::new(FilterState {
                url,
                applied,
                pending: BTreeSet::new(),
            }),
            events,
        }
    }

    pub fn snapshot(&self) -> UrlQuery {
        self.state.lock().url.clone()
    }

    pub fn filters(&self) -> FilterQuery {
        self.state.lock().url.filters.clone()
    }

    pub fn meta(&self) -> MetaData {
        self.state.lock().url.meta.clone()
    }

    pub fn list_kind(&self) -> ListKind {
        self.state.lock().url.list_kind()
    }

    pub fn applied_filters(&self) -> Vec<AppliedFilter> {
        self.state.lock().applied.clone()
    }

    /// Adds `token` to `key`, newest first. A token that is already present is a no-op.
    pub fn add_value(&self, key: &str, token: &str, propagation: Propagation) -> FilterChange {
        let mut state = self.state.lock();
        let changed = match key {
            SIDEBAR_KEY | META_DATA_KEY => {
                return self.replace_reserved(&mut state, key, token, propagation)
            }
            _ => state.url.filters.prepend(key, token),
        };
        self.finish(&mut state, changed.then_some(key), propagation)
    }

    /// Makes `token` the single value of `key` (single-valued facets: graph node, sidebar).
    pub fn replace_value(&self, key: &str, token: &str) -> FilterChange {
        let mut state = self.state.lock();
        match key {
            SIDEBAR_KEY | META_DATA_KEY => {
                self.replace_reserved(&mut state, key, token, Propagation::Publish)
            }
            _ => {
                let changed = state.url.filters.replace(key, token);
                self.finish(&mut state, changed.then_some(key), Propagation::Publish)
            }
        }
    }

    pub fn remove_key(&self, key: &str) -> FilterChange {
        let mut state = self.state.lock();
        let changed = match key {
            SIDEBAR_KEY => state.url.sidebar.take().is_some(),
            META_DATA_KEY => {
                let had_meta = !state.url.meta.is_empty();
                state.url.meta = MetaData::default();
                had_meta
            }
            _ => state.url.filters.remove_key(key),
        };
        self.finish(&mut state, changed.then_some(key), Propagation::Publish)
    }

    /// Removes one token; an absent key or token is a no-op.
    pub fn remove_value(&self, key: &str, token: &str, propagation: Propagation) -> FilterChange {
        let mut state = self.state.lock();
        let changed = state.url.filters.remove_token(key, token);
        self.finish(&mut state, changed.then_some(key), propagation)
    }

    /// Removes every key in `keys` as a single published mutation.
    pub fn remove_keys(&self, keys: &[&str]) -> FilterChange {
        let mut state = self.state.lock();
        for key in keys {
            if state.url.filters.remove_key(key) {
                state.pending.insert(key.to_string());
            }
        }
        self.finish(&mut state, None, Propagation::Publish)
    }

    pub fn set_list_kind(&self, kind: ListKind) -> FilterChange {
        let mut state = self.state.lock();
        let changed = state.url.sidebar != Some(kind);
        state.url.sidebar = Some(kind);
        self.finish(&mut state, changed.then_some(SIDEBAR_KEY), Propagation::Publish)
    }

    /// Scopes the results to a graph node, clearing any node exclusion.
    pub fn select_node(&self, node_id: &str) -> FilterChange {
        let mut state = self.state.lock();
        if state.url.filters.remove_key(EXCLUDE_NODE_KEY) {
            state.pending.insert(EXCLUDE_NODE_KEY.to_string());
        }
        let changed = state.url.filters.replace(NODE_KEY, node_id);
        self.finish(&mut state, changed.then_some(NODE_KEY), Propagation::Publish)
    }

    /// Drops the graph node scope and exclusion.
    pub fn clear_node(&self) -> FilterChange {
        self.remove_keys(&[NODE_KEY, EXCLUDE_NODE_KEY])
    }

    /// Checks a facet choice: remembers its label for the chip, then filters by it.
    pub fn select_choice(&self, facet: Facet, choice: &FacetChoice) -> FilterChange {
        let id = choice.id.to_string();
        {
            let mut state = self.state.lock();
            state.url.meta.insert(&id, &choice.label);
            state.pending.insert(META_DATA_KEY.to_string());
        }
        self.add_value(facet.include_key(), &id, Propagation::Publish)
    }

    /// Unchecks a facet choice, whether it was included or excluded.
    pub fn deselect_choice(&self, facet: Facet, choice: &FacetChoice) -> FilterChange {
        let id = choice.id.to_string();
        {
            let mut state = self.state.lock();
            if state.url.meta.remove(&id).is_some() {
                state.pending.insert(META_DATA_KEY.to_string());
            }
        }
        self.remove_value(facet.include_key(), &id, Propagation::Silent);
        self.remove_value(facet.exclude_key(), &id, Propagation::Publish)
    }

    /// Turns an included choice into an excluded one.
    pub fn exclude_choice(&self, facet: Facet, choice: &FacetChoice) -> FilterChange {
        let id = choice.id.to_string();
        {
            let mut state = self.state.lock();
            state.url.meta.insert(&id, &choice.label);
            state.pending.insert(META_DATA_KEY.to_string());
        }
        self.remove_value(facet.include_key(), &id, Propagation::Silent);
        self.add_value(facet.exclude_key(), &id, Propagation::Publish)
    }

    pub fn is_checked(&self, facet: Facet, id: i64) -> bool {
        let id = id.to_string();
        let state = self.state.lock();
        state.url.filters.contains(facet.include_key(), &id)
            || state.url.filters.contains(facet.exclude_key(), &id)
    }

    pub fn is_excluded(&self, facet: Facet, id: i64) -> bool {
        self.state
            .lock()
            .url
            .filters
            .contains(facet.exclude_key(), &id.to_string())
    }

    fn replace_reserved(
        &self,
        state: &mut FilterState,
        key: &str,
        token: &str,
        propagation: Propagation,
    ) -> FilterChange {
        let changed = match key {
            SIDEBAR_KEY => match token.parse::<ListKind>() {
                Ok(kind) => {
                    let changed = state.url.sidebar != Some(kind);
                    state.url.sidebar = Some(kind);
                    changed
                }
                Err(err) => {
                    tracing::warn!("Ignoring sidebar selection: {err}");
                    false
                }
            },
            _ => {
                let meta = MetaData::parse_or_empty(token);
                let changed = state.url.meta != meta;
                state.url.meta = meta;
                changed
            }
        };
        self.finish(state, changed.then_some(key), propagation)
    }

    fn finish(
        &self,
        state: &mut FilterState,
        changed: Option<&str>,
        propagation: Propagation,
    ) -> FilterChange {
        if let Some(key) = changed {
            state.pending.insert(key.to_string());
        }
        if state.pending.is_empty() {
            return FilterChange::Unchanged;
        }
        match propagation {
            Propagation::Silent => FilterChange::Staged,
            Propagation::Publish => {
                self.address.replace_query(&state.url.serialize());
                state.applied = humanize(&state.url.filters, &state.url.meta);
                let keys = std::mem::take(&mut state.pending);
                tracing::debug!("Published filter change of {:?}", keys);
                self.events
                    .emit(Event::FiltersApplied(state.applied.clone()));
                FilterChange::Published { keys }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn controller(query: &str) -> (Arc<MemoryAddressBar>, FilterStateController<MemoryAddressBar>) {
        let address = Arc::new(MemoryAddressBar::new(query));
        let filters = FilterStateController::new(address.clone(), EventSink::detached());
        (address, filters)
    }

    #[test]
    fn test_add_value_prepends_and_persists() {
        let (address, filters) = controller("");
        assert!(filters
            .add_value("websites", "42", Propagation::Publish)
            .is_published());
        assert_eq!(address.query(), "?websites=42");
        filters.add_value("websites", "9", Propagation::Publish);
        assert_eq!(address.query(), "?websites=9,42");
        assert_eq!(address.replacements(), 2);
    }

    #[test]
    fn test_add_value_is_idempotent() {
        let (address, filters) = controller("?topics=3");
        let before = filters.snapshot();
        assert_eq!(
            filters.add_value("topics", "3", Propagation::Publish),
            FilterChange::Unchanged
        );
        assert_eq!(filters.snapshot(), before);
        assert_eq!(address.replacements(), 0);
    }

    #[test]
    fn test_remove_value_twice() {
        let (address, filters) = controller("?topics=3,7");
        assert!(filters
            .remove_value("topics", "7", Propagation::Publish)
            .is_published());
        let after_first = filters.snapshot();
        assert_eq!(
            filters.remove_value("topics", "7", Propagation::Publish),
            FilterChange::Unchanged
        );
        assert_eq!(filters.snapshot(), after_first);
        assert_eq!(address.query(), "?topics=3");
        filters.remove_value("topics", "3", Propagation::Publish);
        assert_eq!(address.query(), "?");
        assert!(filters.filters().is_empty());
    }

    #[test]
    fn test_silent_changes_ride_along() {
        let (address, filters) = controller("");
        assert_eq!(
            filters.add_value("websites", "1", Propagation::Silent),
            FilterChange::Staged
        );
        assert_eq!(address.replacements(), 0);
        match filters.add_value("topics", "2", Propagation::Publish) {
            FilterChange::Published { keys } => {
                assert!(keys.contains("websites"));
                assert!(keys.contains("topics"));
            }
            other => panic!("expected publish, got {other:?}"),
        }
        assert_eq!(address.query(), "?websites=1&topics=2");
    }

    #[test]
    fn test_silent_sidebar_is_staged() {
        let (address, filters) = controller("?topics=1");
        assert_eq!(
            filters.add_value(SIDEBAR_KEY, "favorite", Propagation::Silent),
            FilterChange::Staged
        );
        assert_eq!(address.replacements(), 0);
        assert_eq!(filters.list_kind(), ListKind::Favorite);

        match filters.add_value("topics", "2", Propagation::Publish) {
            FilterChange::Published { keys } => assert!(keys.contains(SIDEBAR_KEY)),
            other => panic!("expected publish, got {other:?}"),
        }
        assert_eq!(address.query(), "?topics=2,1&sidebar=favorite");
    }

    #[test]
    fn test_applied_filters_recomputed() {
        let (_address, filters) = controller("?topics=3&metaData=%7B%223%22%3A%22News%22%7D");
        assert_eq!(filters.applied_filters()[0].to_string(), "topics: News");
        filters.add_value("topics", "8", Propagation::Publish);
        let chips = filters
            .applied_filters()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        assert_eq!(chips, vec!["topics: 8", "topics: News"]);
    }

    #[test]
    fn test_sidebar_routes_to_list_kind() {
        let (address, filters) = controller("?topics=1");
        let change = filters.replace_value(SIDEBAR_KEY, "archive");
        assert!(change.is_published());
        assert!(!change.affects_graph_scope());
        assert_eq!(filters.list_kind(), ListKind::Archived);
        assert_eq!(address.query(), "?topics=1&sidebar=archive");
        assert!(!filters.filters().has_key(SIDEBAR_KEY));
        assert_eq!(
            filters.replace_value(SIDEBAR_KEY, "nonsense"),
            FilterChange::Unchanged
        );
    }

    #[test]
    fn test_node_selection_does_not_affect_graph_scope() {
        let (address, filters) = controller("?topics=1&exclude_node=4");
        let change = filters.select_node("12");
        assert!(change.is_published());
        assert!(!change.affects_graph_scope());
        assert_eq!(address.query(), "?topics=1&node=12");

        assert!(filters
            .add_value("topics", "2", Propagation::Publish)
            .affects_graph_scope());

        let cleared = filters.clear_node();
        assert!(cleared.is_published());
        assert!(!cleared.affects_graph_scope());
        assert!(!filters.filters().has_key(NODE_KEY));
        assert_eq!(filters.clear_node(), FilterChange::Unchanged);
    }

    #[test]
    fn test_choice_selection_cycle() {
        let (address, filters) = controller("");
        let choice = FacetChoice {
            id: 42,
            label: "example.com".to_string(),
        };
        filters.select_choice(Facet::Website, &choice);
        assert!(filters.is_checked(Facet::Website, 42));
        assert!(!filters.is_excluded(Facet::Website, 42));
        assert_eq!(
            filters.applied_filters()[0].to_string(),
            "websites: example.com"
        );

        filters.exclude_choice(Facet::Website, &choice);
        assert!(filters.is_checked(Facet::Website, 42));
        assert!(filters.is_excluded(Facet::Website, 42));
        assert!(!filters.filters().has_key("websites"));

        let replacements = address.replacements();
        assert!(filters
            .deselect_choice(Facet::Website, &choice)
            .is_published());
        assert_eq!(address.replacements(), replacements + 1);
        assert!(!filters.is_checked(Facet::Website, 42));
        assert!(filters.meta().is_empty());
        assert_eq!(address.query(), "?");
    }

    #[test]
    fn test_remove_key() {
        let (address, filters) = controller("?q=rust&topics=1");
        assert!(filters.remove_key("q").is_published());
        assert_eq!(address.query(), "?topics=1");
        assert_eq!(filters.remove_key("q"), FilterChange::Unchanged);
    }
}
