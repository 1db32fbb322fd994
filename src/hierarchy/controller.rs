use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    tree::{Expansion, GraphNode, GraphTree, NodeHandle},
    GRAPH_PATH,
};
use crate::{
    event::{Event, EventSink},
    flight::{Generation, InFlight},
    query::{FilterQuery, NODE_KEY},
    source::{BookmarkSource, PagedFetcher},
    FacetError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeColor {
    /// Whatever the widget's palette assigns.
    Palette,
    Active,
    ShardedIslands,
}

impl NodeColor {
    pub fn css(&self) -> Option<&'static str> {
        match self {
            NodeColor::Palette => None,
            NodeColor::Active => Some("red"),
            NodeColor::ShardedIslands => Some("yellow"),
        }
    }
}

/// The rendering widget. The controller only drives these primitives and owns no drawing logic.
pub trait GraphCanvas: Send {
    /// Tear down the previously rendered instance.
    fn dispose(&mut self);
    /// Render `tree` from its root, showing one level of children.
    fn render(&mut self, tree: &GraphTree);
    fn enable_children(&mut self, node: NodeHandle);
    fn disable_children(&mut self, node: NodeHandle);
    fn add_children(&mut self, node: NodeHandle, children: &[(NodeHandle, GraphNode)]);
    fn set_color(&mut self, node: NodeHandle, color: NodeColor);
}

/// What a node click means for the filter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToggleOutcome {
    /// Scope the results to this node id.
    Opened(i64),
    /// Drop the node scope.
    Closed,
    /// Nothing to apply: the click was dropped, hit the root, or expanded to at most one child.
    Unchanged,
}

#[derive(Debug)]
struct GraphView {
    tree: GraphTree,
    active: Option<NodeHandle>,
}

impl GraphView {
    fn base_color(&self, handle: NodeHandle) -> NodeColor {
        match self.tree.node(handle) {
            Ok(node) if node.is_sharded_islands => NodeColor::ShardedIslands,
            _ => NodeColor::Palette,
        }
    }

    fn activate<C: GraphCanvas>(&mut self, canvas: &mut C, handle: NodeHandle) {
        self.deactivate(canvas);
        canvas.set_color(handle, NodeColor::Active);
        self.active = Some(handle);
    }

    fn deactivate<C: GraphCanvas>(&mut self, canvas: &mut C) {
        if let Some(previous) = self.active.take() {
            canvas.set_color(previous, self.base_color(previous));
        }
    }

    /// An opened node becomes the single active node; anything else clears the highlight.
    fn finish<C: GraphCanvas>(
        &mut self,
        canvas: &mut C,
        handle: NodeHandle,
        opened: bool,
    ) -> Result<ToggleOutcome, FacetError> {
        self.tree.set_opened(handle, opened)?;
        if opened {
            let id = self.tree.node(handle)?.id;
            self.activate(canvas, handle);
            Ok(ToggleOutcome::Opened(id))
        } else {
            self.deactivate(canvas);
            Ok(ToggleOutcome::Closed)
        }
    }
}

struct GraphState<C> {
    canvas: C,
    view: Option<GraphView>,
}

pub struct HierarchyGraphController<S, C> {
    fetcher: PagedFetcher<S>,
    state: Mutex<GraphState<C>>,
    clicking: InFlight,
    generation: Generation,
    events: EventSink,
}

fn graph_scope(query: &FilterQuery) -> FilterQuery {
    query.without(&[NODE_KEY])
}

fn not_started() -> FacetError {
    FacetError::NotFound("hierarchy graph has not been started".to_string())
}

impl<S: BookmarkSource, C: GraphCanvas> HierarchyGraphController<S, C> {
    pub fn new(source: Arc<S>, canvas: C, events: EventSink) -> Self {
        HierarchyGraphController {
            fetcher: PagedFetcher::new(source),
            state: Mutex::new(GraphState { canvas, view: None }),
            clicking: InFlight::new("graph node click"),
            generation: Generation::default(),
            events,
        }
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().view.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.clicking.is_busy()
    }

    pub fn with_tree<R>(&self, f: impl FnOnce(&GraphTree) -> R) -> Option<R> {
        self.state.lock().view.as_ref().map(|view| f(&view.tree))
    }

    pub fn with_canvas<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.state.lock().canvas)
    }

    pub fn find(&self, id: i64) -> Option<NodeHandle> {
        self.with_tree(|tree| tree.find(id)).flatten()
    }

    pub fn expansion(&self, handle: NodeHandle) -> Result<Expansion, FacetError> {
        self.with_tree(|tree| tree.expansion(handle))
            .unwrap_or_else(|| Err(not_started()))
    }

    pub fn active(&self) -> Option<NodeHandle> {
        self.state.lock().view.as_ref().and_then(|view| view.active)
    }

    /// Drops the active highlight, e.g. when the node scope was removed from the filters.
    pub fn clear_active(&self) {
        let mut state = self.state.lock();
        let GraphState { canvas, view } = &mut *state;
        if let Some(view) = view.as_mut() {
            view.deactivate(canvas);
        }
    }

    /// Rebuilds the graph for `query`. The previous instance is kept if the fetch fails.
    #[tracing::instrument(skip(self, query))]
    pub async fn start(&self, query: &FilterQuery) -> Result<(), FacetError> {
        let generation = self.generation.advance();
        let roots = match self
            .fetcher
            .fetch_list::<GraphNode>(GRAPH_PATH, &graph_scope(query))
            .await
        {
            Ok(roots) => roots,
            Err(err) => {
                self.events.surface(&err);
                return Err(err);
            }
        };
        if !self.generation.is_current(generation) {
            tracing::debug!("Discarding roots of a superseded graph rebuild");
            return Ok(());
        }

        let count = roots.len();
        let tree = GraphTree::new(roots);
        {
            let mut state = self.state.lock();
            let GraphState { canvas, view } = &mut *state;
            if view.is_some() {
                canvas.dispose();
            }
            canvas.render(&tree);
            for sharded in tree.sharded_children(tree.root()) {
                canvas.set_color(sharded, NodeColor::ShardedIslands);
            }
            *view = Some(GraphView { tree, active: None });
        }
        tracing::info!("Rebuilt hierarchy graph with {count} roots");
        self.events.emit(Event::GraphRebuilt { roots: count });
        Ok(())
    }

    /// Handles a click on `handle`, fetching its children scoped to `query` on first expansion.
    ///
    /// Clicks arriving while another one is being processed are dropped.
    #[tracing::instrument(skip(self, query))]
    pub async fn toggle(
        &self,
        handle: NodeHandle,
        query: &FilterQuery,
    ) -> Result<ToggleOutcome, FacetError> {
        let Some(_click) = self.clicking.try_begin() else {
            tracing::debug!("Dropping click, another node is still being toggled");
            return Ok(ToggleOutcome::Unchanged);
        };
        let generation = self.generation.current();

        let node_id = {
            let mut state = self.state.lock();
            let GraphState { canvas, view } = &mut *state;
            let view = view.as_mut().ok_or_else(not_started)?;
            if view.tree.is_root(handle) {
                return Ok(ToggleOutcome::Unchanged);
            }
            let node = view.tree.node(handle)?;
            if node.is_leaf() {
                let opened = !view.tree.is_opened(handle)?;
                return view.finish(canvas, handle, opened);
            }
            let node_id = node.id;
            match view.tree.expansion(handle)? {
                Expansion::Expanded => {
                    canvas.disable_children(handle);
                    return view.finish(canvas, handle, false);
                }
                Expansion::CollapsedLoaded => {
                    canvas.enable_children(handle);
                    return view.finish(canvas, handle, true);
                }
                Expansion::CollapsedUnloaded => node_id,
            }
        };

        let children = match self
            .fetcher
            .fetch_list::<GraphNode>(&format!("{GRAPH_PATH}{node_id}"), &graph_scope(query))
            .await
        {
            Ok(children) => children,
            Err(err) => {
                self.events.surface(&err);
                return Err(err);
            }
        };
        if !self.generation.is_current(generation) {
            tracing::debug!("Discarding children of node {node_id} from a superseded graph");
            return Ok(ToggleOutcome::Unchanged);
        }
        if children.len() <= 1 {
            tracing::debug!(
                "Node {node_id} expanded to {} children, leaving it collapsed",
                children.len()
            );
            return Ok(ToggleOutcome::Unchanged);
        }

        let mut state = self.state.lock();
        let GraphState { canvas, view } = &mut *state;
        let view = view.as_mut().ok_or_else(not_started)?;
        let attached = view.tree.attach_children(handle, children)?;
        let added = attached
            .iter()
            .map(|child| Ok((*child, view.tree.node(*child)?.clone())))
            .collect::<Result<Vec<_>, FacetError>>()?;
        canvas.add_children(handle, &added);
        for sharded in view.tree.sharded_children(handle) {
            canvas.set_color(sharded, NodeColor::ShardedIslands);
        }
        view.finish(canvas, handle, true)
    }
}
