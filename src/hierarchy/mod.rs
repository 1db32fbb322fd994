//! Lazily loaded category hierarchy.
//!
//! The server clusters bookmarks into a tree of categories. Only the root level is fetched up
//! front; every other level is fetched on the first click of its parent, scoped to the filters in
//! effect at that moment.
//!
//! # Module Organization
//!
//! - [`tree`]: the petgraph arena holding nodes and their per-node expansion state
//! - [`controller`]: [`HierarchyGraphController`], the click state machine and the
//!   [`GraphCanvas`] rendering collaborator
//!
//! Per node the controller moves through:
//!
//! ```text
//!   CollapsedUnloaded ──click, >1 child──> Expanded <──click──> CollapsedLoaded
//!          │
//!          └──click, <=1 child──> CollapsedUnloaded
//! ```
//!
//! Leaves never load; a click only flips their open flag, which still drives the highlight.

mod controller;
mod tree;


pub use controller::{GraphCanvas, HierarchyGraphController, NodeColor, ToggleOutcome};
pub use tree::{Expansion, GraphNode, GraphTree, NodeHandle};

/// Root level categories; a node's children live at `{GRAPH_PATH}{id}`.
pub const GRAPH_PATH: &str = "/bm/graph/";
