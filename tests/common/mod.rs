//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use bookmark_facets::{
    hierarchy::{GraphCanvas, GraphNode, GraphTree, NodeColor, NodeHandle},
    source::BookmarkSource,
    FacetError,
};
use http::{Method, StatusCode};
use parking_lot::Mutex;
use serde_json::Value;
use std::{collections::HashMap, future::Future};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// An in-memory backend: fixed bodies or statuses per path, every request logged.
#[derive(Debug, Default)]
pub struct FakeBackend {
    routes: Mutex<HashMap<String, Result<Value, StatusCode>>>,
    log: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn route(&self, path: &str, body: Value) {
        self.routes.lock().insert(path.to_string(), Ok(body));
    }

    pub fn route_status(&self, path: &str, status: StatusCode) {
        self.routes.lock().insert(path.to_string(), Err(status));
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn answer(&self, entry: String) -> Result<Option<Value>, FacetError> {
        let path = entry.split_once(' ').map(|(_, path)| path).unwrap_or(&entry).to_string();
        self.log.lock().push(entry);
        match self.routes.lock().get(&path) {
            Some(Ok(body)) => Ok(Some(body.clone())),
            Some(Err(status)) => Err(FacetError::from_status(*status, &path)),
            None => Err(FacetError::from_status(StatusCode::NOT_FOUND, &path)),
        }
    }
}

impl BookmarkSource for FakeBackend {
    fn get(&self, path: &str) -> impl Future<Output = Result<Value, FacetError>> + Send {
        let result = self
            .answer(format!("GET {path}"))
            .map(|body| body.unwrap_or(Value::Null));
        async move { result }
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        _body: Option<Value>,
    ) -> impl Future<Output = Result<Option<Value>, FacetError>> + Send {
        let result = self.answer(format!("{method} {path}"));
        async move { result }
    }
}

/// Keeps only the node colors.
#[derive(Debug, Default)]
pub struct ColorCanvas {
    pub colors: HashMap<NodeHandle, NodeColor>,
    pub rendered: usize,
}

impl GraphCanvas for ColorCanvas {
    fn dispose(&mut self) {
        self.colors.clear();
    }

    fn render(&mut self, _tree: &GraphTree) {
        self.rendered += 1;
    }

    fn enable_children(&mut self, _node: NodeHandle) {}

    fn disable_children(&mut self, _node: NodeHandle) {}

    fn add_children(&mut self, _node: NodeHandle, _children: &[(NodeHandle, GraphNode)]) {}

    fn set_color(&mut self, node: NodeHandle, color: NodeColor) {
        self.colors.insert(node, color);
    }
}
