//! Shared fakes for controller tests

use http::Method;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    future::Future,
    time::Duration,
};
use tokio::sync::watch;

use crate::{
    hierarchy::{GraphCanvas, GraphNode, GraphTree, NodeColor, NodeHandle},
    source::BookmarkSource,
    FacetError,
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Result<Value, FacetError>>,
    /// The last queued response has answered at least once.
    served: bool,
}

/// A [`BookmarkSource`] answering from a script keyed by request path.
///
/// Responses for one path are consumed in order; the last one keeps answering until a new one
/// is scripted. While the source is held, every request is recorded immediately but its
/// response waits for `release`. A path given a delay answers only after it elapsed.
#[derive(Debug)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<String, Script>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<String>>,
    sent: Mutex<Vec<(Method, String)>>,
    gate: watch::Sender<bool>,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        init_logging();
        let (gate, _) = watch::channel(true);
        ScriptedSource {
            responses: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            gate,
        }
    }
}

impl ScriptedSource {
    pub fn respond(&self, path: &str, body: Value) {
        self.script(path, Ok(body));
    }

    pub fn fail(&self, path: &str, err: FacetError) {
        self.script(path, Err(err));
    }

    pub fn delay(&self, path: &str, delay: Duration) {
        self.delays.lock().insert(path.to_string(), delay);
    }

    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Paths requested through `get`, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Method and path of every `send`, in order.
    pub fn sent(&self) -> Vec<(Method, String)> {
        self.sent.lock().clone()
    }

    fn script(&self, path: &str, response: Result<Value, FacetError>) {
        let mut responses = self.responses.lock();
        let script = responses.entry(path.to_string()).or_default();
        if script.served {
            script.queue.clear();
            script.served = false;
        }
        script.queue.push_back(response);
    }

    fn next_response(&self, path: &str) -> Result<Value, FacetError> {
        let mut responses = self.responses.lock();
        let Some(script) = responses.get_mut(path) else {
            return Err(FacetError::NotFound(path.to_string()));
        };
        if script.queue.len() > 1 {
            return script
                .queue
                .pop_front()
                .unwrap_or_else(|| Err(FacetError::NotFound(path.to_string())));
        }
        script.served = true;
        script
            .queue
            .front()
            .cloned()
            .unwrap_or_else(|| Err(FacetError::NotFound(path.to_string())))
    }
}

impl BookmarkSource for ScriptedSource {
    fn get(&self, path: &str) -> impl Future<Output = Result<Value, FacetError>> + Send {
        self.requests.lock().push(path.to_string());
        let response = self.next_response(path);
        let delay = self.delays.lock().get(path).copied();
        let mut gate = self.gate.subscribe();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            gate.wait_for(|open| *open).await.ok();
            response
        }
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        _body: Option<Value>,
    ) -> impl Future<Output = Result<Option<Value>, FacetError>> + Send {
        self.sent.lock().push((method, path.to_string()));
        async { Ok(None) }
    }
}

/// A facet choice page. Choices carry both label fields so either facet can decode them.
pub fn choice_page(choices: &[(i64, &str)], next: Option<&str>) -> Value {
    let results = choices
        .iter()
        .map(|(id, label)| json!({ "id": id, "domain": label, "name": label }))
        .collect::<Vec<_>>();
    json!({ "count": results.len(), "next": next, "results": results })
}

pub fn bookmark_page(ids: &[i64], count: u64, next: Option<&str>) -> Value {
    let results = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "url": format!("https://example.com/{id}"),
                "title": format!("Bookmark {id}"),
                "favorite": false,
                "user_status": 1
            })
        })
        .collect::<Vec<_>>();
    json!({ "count": count, "next": next, "results": results })
}

/// Graph nodes as `(id, children_count)`.
pub fn graph_nodes(nodes: &[(i64, u64)]) -> Value {
    Value::Array(
        nodes
            .iter()
            .map(|(id, children)| {
                json!({
                    "id": id,
                    "name": format!("category {id}"),
                    "children_count": children,
                    "bookmarks_count": children * 3 + 1
                })
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasCall {
    Dispose,
    Render(Vec<i64>),
    Enable(NodeHandle),
    Disable(NodeHandle),
    Add(NodeHandle, Vec<i64>),
    Color(NodeHandle, NodeColor),
}

/// A [`GraphCanvas`] that records every call and tracks the current node colors.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub calls: Vec<CanvasCall>,
    pub colors: BTreeMap<NodeHandle, NodeColor>,
}

impl RecordingCanvas {
    pub fn color(&self, node: NodeHandle) -> NodeColor {
        self.colors.get(&node).copied().unwrap_or(NodeColor::Palette)
    }

    pub fn colored(&self, color: NodeColor) -> Vec<NodeHandle> {
        self.colors
            .iter()
            .filter(|(_, c)| **c == color)
            .map(|(node, _)| *node)
            .collect()
    }
}

impl GraphCanvas for RecordingCanvas {
    fn dispose(&mut self) {
        self.calls.push(CanvasCall::Dispose);
        self.colors.clear();
    }

    fn render(&mut self, tree: &GraphTree) {
        let roots = tree
            .children(tree.root())
            .into_iter()
            .filter_map(|child| tree.node(child).ok().map(|node| node.id))
            .collect();
        self.calls.push(CanvasCall::Render(roots));
    }

    fn enable_children(&mut self, node: NodeHandle) {
        self.calls.push(CanvasCall::Enable(node));
    }

    fn disable_children(&mut self, node: NodeHandle) {
        self.calls.push(CanvasCall::Disable(node));
    }

    fn add_children(&mut self, node: NodeHandle, children: &[(NodeHandle, GraphNode)]) {
        self.calls.push(CanvasCall::Add(
            node,
            children.iter().map(|(_, child)| child.id).collect(),
        ));
    }

    fn set_color(&mut self, node: NodeHandle, color: NodeColor) {
        self.calls.push(CanvasCall::Color(node, color));
        self.colors.insert(node, color);
    }
}
