use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc::UnboundedSender;

use crate::{choices::Facet, query::AppliedFilter, FacetError};

/// Notifications emitted by the controllers for the surrounding UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A transient, user visible message (toast).
    Notice(String),
    /// The session token was rejected; the UI must sign out.
    SessionExpired,
    /// The applied-filter chips were recomputed after a filter mutation.
    FiltersApplied(Vec<AppliedFilter>),
    /// The result list now holds `count` of `total` items.
    ResultsLoaded { count: usize, total: u64 },
    /// A facet choice list was replaced or extended.
    ChoicesLoaded { facet: Facet, count: usize },
    /// The hierarchy graph was rebuilt with `roots` top-level nodes.
    GraphRebuilt { roots: usize },
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Event::Notice(_) => write!(f, "Notice"),
            Event::SessionExpired => write!(f, "SessionExpired"),
            Event::FiltersApplied(_) => write!(f, "FiltersApplied"),
            Event::ResultsLoaded { .. } => write!(f, "ResultsLoaded"),
            Event::ChoicesLoaded { .. } => write!(f, "ChoicesLoaded"),
            Event::GraphRebuilt { .. } => write!(f, "GraphRebuilt"),
        }
    }
}

/// Optional event channel shared by all controllers of one dashboard.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<Event>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<Event>) -> Self {
        EventSink { tx: Some(tx) }
    }

    /// A sink that only logs.
    pub fn detached() -> Self {
        EventSink::default()
    }

    pub fn emit(&self, event: Event) {
        match &self.tx {
            Some(tx) => {
                if let Err(err) = tx.send(event) {
                    tracing::debug!("Event receiver is gone, dropping {}", err.0);
                }
            }
            None => tracing::debug!("No event receiver, dropping {event}"),
        }
    }

    /// Route a failure to the UI: an expired session always tears the session down, whichever
    /// controller hit it; anything else becomes a transient notice.
    pub fn surface(&self, err: &FacetError) {
        if err.is_session_fatal() {
            tracing::warn!("Session expired");
            self.emit(Event::SessionExpired);
        } else {
            tracing::warn!("{err}");
            self.emit(Event::Notice(err.to_string()));
        }
    }
}
