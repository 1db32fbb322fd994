//! The dashboard hub.
//!
//! [`Dashboard`] wires the controllers together. Every mutation goes through the
//! [`FilterStateController`]; the returned [`FilterChange`] then decides what follows:
//!
//! 1. a published change reloads the result list from its first page,
//! 2. a change outside the node selection rebuilds the hierarchy graph, if it is shown,
//! 3. with the filter panel open, both facet choice lists are reloaded.
//!
//! Graph clicks run the other way round: the [`ToggleOutcome`] becomes a node selection (or its
//! removal) and reloads the results without rebuilding the graph that was just clicked.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    actions::BookmarkAction,
    choices::{Facet, FacetChoice, FilterChoiceSearcher},
    config::FacetConfig,
    event::EventSink,
    filter::{AddressBar, FilterChange, FilterStateController, Propagation},
    hierarchy::{GraphCanvas, HierarchyGraphController, NodeHandle, ToggleOutcome},
    query::{AppliedFilter, ListKind, NODE_KEY},
    results::{ResultListController, Viewport},
    source::BookmarkSource,
    tags::TagCloud,
    FacetError,
};

pub struct Dashboard<S, A, C> {
    source: Arc<S>,
    filters: FilterStateController<A>,
    results: ResultListController<S>,
    websites: FilterChoiceSearcher<S>,
    topics: FilterChoiceSearcher<S>,
    graph: HierarchyGraphController<S, C>,
    graph_visible: AtomicBool,
    panel_open: AtomicBool,
}

impl<S, A, C> Dashboard<S, A, C>
where
    S: BookmarkSource + 'static,
    A: AddressBar,
    C: GraphCanvas,
{
    pub fn new(
        source: Arc<S>,
        address: Arc<A>,
        canvas: C,
        config: &FacetConfig,
        events: EventSink,
    ) -> Self {
        Dashboard {
            filters: FilterStateController::new(address, events.clone()),
            results: ResultListController::new(source.clone(), config, events.clone()),
            websites: FilterChoiceSearcher::new(
                Facet::Website,
                source.clone(),
                config,
                events.clone(),
            ),
            topics: FilterChoiceSearcher::new(Facet::Topic, source.clone(), config, events.clone()),
            graph: HierarchyGraphController::new(source.clone(), canvas, events),
            source,
            graph_visible: AtomicBool::new(false),
            panel_open: AtomicBool::new(false),
        }
    }

    pub fn filters(&self) -> &FilterStateController<A> {
        &self.filters
    }

    pub fn results(&self) -> &ResultListController<S> {
        &self.results
    }

    pub fn searcher(&self, facet: Facet) -> &FilterChoiceSearcher<S> {
        match facet {
            Facet::Website => &self.websites,
            Facet::Topic => &self.topics,
        }
    }

    pub fn graph(&self) -> &HierarchyGraphController<S, C> {
        &self.graph
    }

    pub fn is_graph_visible(&self) -> bool {
        self.graph_visible.load(Ordering::Acquire)
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open.load(Ordering::Acquire)
    }

    /// Loads the first result page for the query the address bar started with.
    pub async fn init(&self) -> Result<(), FacetError> {
        self.results
            .reset(&self.filters.filters(), self.filters.list_kind())
            .await
    }

    /// Runs the reloads a filter mutation calls for. All of them are attempted; the first
    /// failure is returned.
    #[tracing::instrument(skip(self))]
    pub async fn apply(&self, change: FilterChange) -> Result<FilterChange, FacetError> {
        if !change.needs_reload() {
            return Ok(change);
        }
        let query = self.filters.filters();
        let mut outcome = self.results.reset(&query, self.filters.list_kind()).await;

        if self.is_graph_visible() && change.affects_graph_scope() {
            outcome = outcome.and(self.graph.start(&query).await);
        }
        if let FilterChange::Published { keys } = &change {
            if keys.contains(NODE_KEY) && !query.has_key(NODE_KEY) {
                self.graph.clear_active();
            }
        }
        if self.is_panel_open() {
            let (websites, topics) =
                tokio::join!(self.websites.open(&query), self.topics.open(&query));
            outcome = outcome.and(websites).and(topics);
        }
        outcome.map(|_| change)
    }

    pub async fn add_value(&self, key: &str, token: &str) -> Result<FilterChange, FacetError> {
        self.apply(self.filters.add_value(key, token, Propagation::Publish))
            .await
    }

    pub async fn replace_value(&self, key: &str, token: &str) -> Result<FilterChange, FacetError> {
        self.apply(self.filters.replace_value(key, token)).await
    }

    pub async fn remove_value(&self, key: &str, token: &str) -> Result<FilterChange, FacetError> {
        self.apply(self.filters.remove_value(key, token, Propagation::Publish))
            .await
    }

    pub async fn remove_key(&self, key: &str) -> Result<FilterChange, FacetError> {
        self.apply(self.filters.remove_key(key)).await
    }

    /// Removes the token behind an applied-filter chip.
    pub async fn remove_applied(&self, filter: &AppliedFilter) -> Result<FilterChange, FacetError> {
        self.remove_value(&filter.key, &filter.token).await
    }

    pub async fn set_list_kind(&self, kind: ListKind) -> Result<FilterChange, FacetError> {
        self.apply(self.filters.set_list_kind(kind)).await
    }

    pub async fn select_choice(
        &self,
        facet: Facet,
        choice: &FacetChoice,
    ) -> Result<FilterChange, FacetError> {
        self.apply(self.filters.select_choice(facet, choice)).await
    }

    pub async fn deselect_choice(
        &self,
        facet: Facet,
        choice: &FacetChoice,
    ) -> Result<FilterChange, FacetError> {
        self.apply(self.filters.deselect_choice(facet, choice)).await
    }

    pub async fn exclude_choice(
        &self,
        facet: Facet,
        choice: &FacetChoice,
    ) -> Result<FilterChange, FacetError> {
        self.apply(self.filters.exclude_choice(facet, choice)).await
    }

    /// Shows the graph, building it on first display.
    pub async fn show_graph(&self) -> Result<(), FacetError> {
        self.graph_visible.store(true, Ordering::Release);
        if self.graph.is_started() {
            return Ok(());
        }
        self.graph.start(&self.filters.filters()).await
    }

    pub fn hide_graph(&self) {
        self.graph_visible.store(false, Ordering::Release);
    }

    /// Handles a graph node click and scopes the results to the outcome.
    pub async fn click_node(&self, node: NodeHandle) -> Result<ToggleOutcome, FacetError> {
        let outcome = self.graph.toggle(node, &self.filters.filters()).await?;
        let change = match outcome {
            ToggleOutcome::Opened(id) => self.filters.select_node(&id.to_string()),
            ToggleOutcome::Closed => self.filters.clear_node(),
            ToggleOutcome::Unchanged => return Ok(outcome),
        };
        self.apply(change).await?;
        Ok(outcome)
    }

    pub async fn open_panel(&self) -> Result<(), FacetError> {
        self.panel_open.store(true, Ordering::Release);
        let query = self.filters.filters();
        let (websites, topics) =
            tokio::join!(self.websites.open(&query), self.topics.open(&query));
        websites.and(topics)
    }

    pub fn close_panel(&self) {
        self.panel_open.store(false, Ordering::Release);
        self.websites.close();
        self.topics.close();
    }

    /// Debounced search in one facet's choices, scoped to the current filters.
    pub fn search_choices(&self, facet: Facet, text: &str) {
        self.searcher(facet).search(&self.filters.filters(), text);
    }

    pub async fn load_more_choices(&self, facet: Facet) -> Result<bool, FacetError> {
        self.searcher(facet).load_more().await
    }

    pub async fn on_scroll(&self, viewport: Viewport) -> Result<bool, FacetError> {
        self.results.on_scroll(viewport).await
    }

    pub async fn apply_action(&self, id: i64, action: BookmarkAction) -> Result<(), FacetError> {
        self.results.apply_action(id, action).await
    }

    pub async fn tag_cloud(&self) -> Result<TagCloud, FacetError> {
        TagCloud::load(self.source.clone()).await
    }
}
