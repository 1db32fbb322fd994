use petgraph::{graph::NodeIndex, Direction, Graph};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::FacetError;

/// A category node as returned by `/bm/graph/` and `/bm/graph/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub children_count: u64,
    #[serde(default)]
    pub bookmarks_count: u64,
    /// Synthetic bucket merging many small categories.
    #[serde(default)]
    pub is_sharded_islands: bool,
}

impl GraphNode {
    pub fn is_leaf(&self) -> bool {
        self.children_count == 0
    }
}

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable reference to a node of one [`GraphTree`].
///
/// A handle remembers the tree that issued it; any other tree, including a rebuild of the same
/// graph, rejects it with [`FacetError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle {
    tree: u64,
    index: NodeIndex,
}

impl NodeHandle {
    pub fn index(&self) -> usize {
        self.index.index()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expansion {
    CollapsedUnloaded,
    CollapsedLoaded,
    Expanded,
}

#[derive(Debug, Clone)]
struct TreeEntry {
    node: GraphNode,
    loaded: bool,
    opened: bool,
}

/// Arena of graph nodes, edges point from parent to child.
///
/// The root is synthetic: it carries id 0 and an empty name, and is born loaded and expanded
/// with the root-level categories as its children.
#[derive(Debug, Clone)]
pub struct GraphTree {
    id: u64,
    graph: Graph<TreeEntry, ()>,
    root: NodeIndex,
}

impl GraphTree {
    pub fn new(roots: Vec<GraphNode>) -> GraphTree {
        let mut graph = Graph::new();
        let root = graph.add_node(TreeEntry {
            node: GraphNode {
                children_count: roots.len() as u64,
                ..Default::default()
            },
            loaded: true,
            opened: true,
        });
        let mut tree = GraphTree {
            id: NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed),
            graph,
            root,
        };
        tree.insert_children(root, roots);
        tree
    }

    fn handle(&self, index: NodeIndex) -> NodeHandle {
        NodeHandle {
            tree: self.id,
            index,
        }
    }

    pub fn root(&self) -> NodeHandle {
        self.handle(self.root)
    }

    pub fn is_root(&self, handle: NodeHandle) -> bool {
        handle == self.root()
    }

    /// True when `handle` was issued by this tree.
    pub fn owns(&self, handle: NodeHandle) -> bool {
        handle.tree == self.id
    }

    /// Number of nodes, the synthetic root included.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() <= 1
    }

    pub fn node(&self, handle: NodeHandle) -> Result<&GraphNode, FacetError> {
        self.entry(handle).map(|entry| &entry.node)
    }

    pub fn find(&self, id: i64) -> Option<NodeHandle> {
        self.graph
            .node_indices()
            .filter(|idx| *idx != self.root)
            .find(|idx| self.graph[*idx].node.id == id)
            .map(|idx| self.handle(idx))
    }

    /// Children in the order the server returned them.
    pub fn children(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        if !self.owns(handle) {
            return Vec::new();
        }
        let mut children = self
            .graph
            .neighbors_directed(handle.index, Direction::Outgoing)
            .map(|idx| self.handle(idx))
            .collect::<Vec<_>>();
        // petgraph walks the adjacency list newest first
        children.reverse();
        children
    }

    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        if !self.owns(handle) {
            return None;
        }
        self.graph
            .neighbors_directed(handle.index, Direction::Incoming)
            .next()
            .map(|idx| self.handle(idx))
    }

    pub fn expansion(&self, handle: NodeHandle) -> Result<Expansion, FacetError> {
        let entry = self.entry(handle)?;
        Ok(match (entry.loaded, entry.opened) {
            (false, _) => Expansion::CollapsedUnloaded,
            (true, false) => Expansion::CollapsedLoaded,
            (true, true) => Expansion::Expanded,
        })
    }

    /// The open flag. For leaves this is purely cosmetic and flips on every click.
    pub fn is_opened(&self, handle: NodeHandle) -> Result<bool, FacetError> {
        self.entry(handle).map(|entry| entry.opened)
    }

    pub fn set_opened(&mut self, handle: NodeHandle, opened: bool) -> Result<(), FacetError> {
        self.entry_mut(handle)?.opened = opened;
        Ok(())
    }

    /// Caches `children` under `handle` and marks it loaded. Returns the new handles.
    pub fn attach_children(
        &mut self,
        handle: NodeHandle,
        children: Vec<GraphNode>,
    ) -> Result<Vec<NodeHandle>, FacetError> {
        let entry = self.entry_mut(handle)?;
        if entry.loaded {
            return Err(FacetError::Custom(format!(
                "children of graph node {} are already loaded",
                entry.node.id
            )));
        }
        entry.loaded = true;
        Ok(self.insert_children(handle.index, children))
    }

    /// Loaded children flagged as sharded islands.
    pub fn sharded_children(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        self.children(handle)
            .into_iter()
            .filter(|child| self.graph[child.index].node.is_sharded_islands)
            .collect()
    }

    fn insert_children(&mut self, parent: NodeIndex, children: Vec<GraphNode>) -> Vec<NodeHandle> {
        children
            .into_iter()
            .map(|node| {
                let idx = self.graph.add_node(TreeEntry {
                    node,
                    loaded: false,
                    opened: false,
                });
                self.graph.add_edge(parent, idx, ());
                self.handle(idx)
            })
            .collect()
    }

    fn entry(&self, handle: NodeHandle) -> Result<&TreeEntry, FacetError> {
        self.owns(handle)
            .then(|| self.graph.node_weight(handle.index))
            .flatten()
            .ok_or_else(|| unknown_handle(handle))
    }

    fn entry_mut(&mut self, handle: NodeHandle) -> Result<&mut TreeEntry, FacetError> {
        if !self.owns(handle) {
            return Err(unknown_handle(handle));
        }
        self.graph
            .node_weight_mut(handle.index)
            .ok_or_else(|| unknown_handle(handle))
    }
}

fn unknown_handle(handle: NodeHandle) -> FacetError {
    FacetError::NotFound(format!(
        "graph node handle {} of tree {}",
        handle.index(),
        handle.tree
    ))
}
