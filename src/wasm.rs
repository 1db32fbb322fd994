//! WASM bindings for bookmark-facets
//!
//! Exposes the address-bar codec to the dashboard's JavaScript so the page and the Rust
//! controllers agree on one query format.
//!
//! ## Usage
//!
//! ```javascript,ignore
//! import init, { FilterQueryWasm, initLogging } from './bookmark_facets.js';
//!
//! async function main() {
//!     await init();
//!     initLogging();
//!
//!     const query = new FilterQueryWasm(window.location.search);
//!     query.addValue("websites", "42");
//!     window.history.replaceState({}, "", `?${query.toString()}`);
//!
//!     // ["websites: example.com", ...]
//!     console.log(query.humanize());
//!     console.log(query.listKind());
//! }
//! ```

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
use web_sys::console;

#[cfg(feature = "wasm")]
use crate::query::{ListKind, MetaData, UrlQuery, META_DATA_KEY, SIDEBAR_KEY};

/// Routes `tracing` output to the browser console.
#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging() {
    tracing_wasm::set_as_global_default();
}

#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub struct FilterQueryWasm {
    inner: UrlQuery,
}

#[cfg(feature = "wasm")]
#[wasm_bindgen]
impl FilterQueryWasm {
    /// Parse a query string, with or without the leading `?`.
    ///
    /// # JavaScript Example
    /// ```javascript,ignore
    /// const query = new FilterQueryWasm("?topics=3,7&sidebar=favorite");
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn parse(query: &str) -> FilterQueryWasm {
        FilterQueryWasm {
            inner: UrlQuery::parse(query),
        }
    }

    /// The query string without the leading `?`.
    #[wasm_bindgen(js_name = toString)]
    pub fn to_query_string(&self) -> String {
        self.inner.serialize()
    }

    /// Applied-filter chips as an array of `"key: label"` strings.
    #[wasm_bindgen]
    pub fn humanize(&self) -> js_sys::Array {
        self.inner
            .applied_filters()
            .iter()
            .map(|filter| JsValue::from_str(&filter.to_string()))
            .collect()
    }

    /// Applied-filter chips as `{key, token, label}` objects.
    #[wasm_bindgen(js_name = appliedFilters)]
    pub fn applied_filters(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.applied_filters()).map_err(|e| {
            let msg = format!("Failed to serialize applied filters: {e}");
            console::error_1(&msg.clone().into());
            JsValue::from_str(&msg)
        })
    }

    /// Prepends `token` to `key`. Returns false if it was already present.
    #[wasm_bindgen(js_name = addValue)]
    pub fn add_value(&mut self, key: &str, token: &str) -> bool {
        match key {
            SIDEBAR_KEY | META_DATA_KEY => self.replace_value(key, token),
            _ => self.inner.filters.prepend(key, token),
        }
    }

    #[wasm_bindgen(js_name = removeValue)]
    pub fn remove_value(&mut self, key: &str, token: &str) -> bool {
        self.inner.filters.remove_token(key, token)
    }

    #[wasm_bindgen(js_name = replaceValue)]
    pub fn replace_value(&mut self, key: &str, token: &str) -> bool {
        match key {
            SIDEBAR_KEY => match token.parse::<ListKind>() {
                Ok(kind) => {
                    let changed = self.inner.sidebar != Some(kind);
                    self.inner.sidebar = Some(kind);
                    changed
                }
                Err(e) => {
                    console::warn_1(&format!("Ignoring sidebar value: {e}").into());
                    false
                }
            },
            META_DATA_KEY => {
                let meta = MetaData::parse_or_empty(token);
                let changed = self.inner.meta != meta;
                self.inner.meta = meta;
                changed
            }
            _ => self.inner.filters.replace(key, token),
        }
    }

    #[wasm_bindgen(js_name = removeKey)]
    pub fn remove_key(&mut self, key: &str) -> bool {
        match key {
            SIDEBAR_KEY => self.inner.sidebar.take().is_some(),
            META_DATA_KEY => {
                let had_meta = !self.inner.meta.is_empty();
                self.inner.meta = MetaData::default();
                had_meta
            }
            _ => self.inner.filters.remove_key(key),
        }
    }

    /// The selected result list, `"all"` when none is selected.
    #[wasm_bindgen(js_name = listKind)]
    pub fn list_kind(&self) -> String {
        self.inner.list_kind().as_token().to_string()
    }

    /// Result list path for the current selection, e.g. `/bm/bookmark/favorite-list/?topics=3`.
    #[wasm_bindgen(js_name = resultsPath)]
    pub fn results_path(&self) -> String {
        self.inner.filters.to_path(self.inner.list_kind().path())
    }
}
