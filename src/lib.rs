//! # bookmark-facets
//!
//! Client-side state layer of a bookmark dashboard: faceted filters kept in the address bar, an
//! infinite-scroll result list, searchable facet choice lists and a lazily loaded category graph.
//!
//! ## Overview
//!
//! The whole filter state lives in the browser's query string. Every user interaction mutates
//! it through a single hub and every mutation fans out to the views that depend on it:
//!
//! ```text
//!   UI events / graph clicks
//!            │
//!            ▼
//!   FilterStateController ──► AddressBar (history replace)
//!            │
//!            ├──► ResultListController       reset to page 1
//!            ├──► HierarchyGraphController   rebuild, unless only the node scope changed
//!            └──► FilterChoiceSearcher (x2)  reload, while the filter panel is open
//! ```
//!
//! All remote reads go through the [`source::BookmarkSource`] trait and the
//! [`source::PagedFetcher`] pagination contract, so the controllers run unchanged against a
//! browser `fetch` bridge, a native HTTP client or a scripted fake.
//!
//! ## Architecture
//!
//! - **[`query`]**: the address-bar codec (`FilterQuery`, `MetaData`, `ListKind`, `humanize`)
//! - **[`filter`]**: `FilterStateController`, the only writer of filter state
//! - **[`results`]**: `ResultListController`, the paginated bookmark list
//! - **[`choices`]**: `FilterChoiceSearcher`, debounced per-facet choice search
//! - **[`hierarchy`]**: `HierarchyGraphController` and its petgraph-backed tree
//! - **[`dashboard`]**: `Dashboard`, the wiring between all of the above
//! - **[`event`]**: notifications and session teardown for the surrounding UI
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bookmark_facets::{
//!     config::FacetConfig, dashboard::Dashboard, event::EventSink, filter::MemoryAddressBar,
//! };
//!
//! let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
//! let dashboard = Dashboard::new(
//!     Arc::new(my_source),
//!     Arc::new(MemoryAddressBar::new("?topics=3,7&sidebar=favorite")),
//!     my_canvas,
//!     &FacetConfig::from_path("facets.toml")?,
//!     EventSink::new(tx),
//! );
//! dashboard.init().await?;
//! dashboard.add_value("websites", "42").await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `wasm`: JavaScript bindings for the query codec ([`wasm`] module)

pub mod actions;
pub mod choices;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod event;
pub mod filter;
pub mod flight;
pub mod hierarchy;
pub mod query;
pub mod results;
pub mod source;
pub mod tags;
#[cfg(test)]
mod tests;
#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::*;
