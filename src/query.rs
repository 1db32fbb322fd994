//! Address-bar query codec.
//!
//! The dashboard keeps its whole filter state in the browser's query string:
//!
//! ```text
//! ?topics=3,7&websites=42&sidebar=favorite&metaData={"3":"News","42":"example.com"}
//! ```
//!
//! Every ordinary key maps to a comma-joined list of tokens. Two keys are reserved and never
//! become filters: `sidebar` selects which result list is shown ([`ListKind`]) and `metaData`
//! carries a JSON object mapping numeric ids to the labels needed to render filter chips
//! ([`MetaData`]). [`UrlQuery`] bundles the three parts; [`FilterQuery`] holds only the filters
//! and is what gets forwarded to the server.

use std::{collections::BTreeMap, fmt, str::FromStr};

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::form_urlencoded::byte_serialize;

use crate::FacetError;

/// JSON id -> label side channel. Display only, never sent to the server.
pub const META_DATA_KEY: &str = "metaData";
/// Selects the active result list.
pub const SIDEBAR_KEY: &str = "sidebar";
/// Active graph node scope.
pub const NODE_KEY: &str = "node";
/// Excluded graph node scope.
pub const EXCLUDE_NODE_KEY: &str = "exclude_node";

pub const RESERVED_KEYS: [&str; 2] = [META_DATA_KEY, SIDEBAR_KEY];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

fn encode(raw: &str) -> String {
    byte_serialize(raw.as_bytes()).collect()
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Splits a query string into decoded `(key, value)` pairs.
fn split_pairs(query: &str) -> impl Iterator<Item = (String, String)> + '_ {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) => (decode(key), decode(value)),
            None => (decode(segment), String::new()),
        })
}

/// Tokens of a decoded value. Browsers write the separator as `%2C`, so splitting happens
/// after decoding and a token can never contain a comma.
fn split_tokens(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Which result list the dashboard shows. Every kind shares the same pagination contract and
/// only differs by the remote resource it reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    #[default]
    All,
    Favorite,
    Archived,
    Trashed,
    History,
    Collections,
}

impl ListKind {
    pub const ALL: [ListKind; 6] = [
        ListKind::All,
        ListKind::Favorite,
        ListKind::Archived,
        ListKind::Trashed,
        ListKind::History,
        ListKind::Collections,
    ];

    /// Token used for the `sidebar` key.
    pub fn as_token(&self) -> &'static str {
        match self {
            ListKind::All => "all",
            ListKind::Favorite => "favorite",
            ListKind::Archived => "archive",
            ListKind::Trashed => "trash",
            ListKind::History => "history",
            ListKind::Collections => "collections",
        }
    }

    /// Remote resource backing this list.
    pub fn path(&self) -> &'static str {
        match self {
            ListKind::All | ListKind::Collections => "/bm/bookmark/list/",
            ListKind::Favorite => "/bm/bookmark/favorite-list/",
            ListKind::Archived => "/bm/bookmark/archived-list/",
            ListKind::Trashed => "/bm/bookmark/deleted-list/",
            ListKind::History => "/bm/bookmark/history-list/",
        }
    }
}

impl FromStr for ListKind {
    type Err = FacetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ListKind::All),
            "favorite" => Ok(ListKind::Favorite),
            "archive" | "archived" => Ok(ListKind::Archived),
            "trash" | "trashed" => Ok(ListKind::Trashed),
            "history" => Ok(ListKind::History),
            "collections" => Ok(ListKind::Collections),
            other => Err(FacetError::NotFound(format!("unknown list kind '{other}'"))),
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Typed view of the `metaData` side channel: token id -> human readable label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData(BTreeMap<String, String>);

impl MetaData {
    /// Strict decode. Fails with [`FacetError::Decode`] when `raw` is not a JSON object.
    pub fn parse(raw: &str) -> Result<MetaData, FacetError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| FacetError::Decode(e.to_string()))?;
        let serde_json::Value::Object(map) = value else {
            return Err(FacetError::Decode(format!(
                "expected a JSON object, found '{raw}'"
            )));
        };
        Ok(MetaData(
            map.into_iter()
                .map(|(id, label)| match label {
                    serde_json::Value::String(s) => (id, s),
                    other => (id, other.to_string()),
                })
                .collect(),
        ))
    }

    /// Metadata is best effort: a malformed blob degrades to an empty map.
    pub fn parse_or_empty(raw: &str) -> MetaData {
        MetaData::parse(raw).unwrap_or_else(|err| {
            tracing::warn!("Ignoring filter metadata: {err}");
            MetaData::default()
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.0.get(id).map(String::as_str)
    }

    pub fn insert<I: ToString, L: ToString>(&mut self, id: I, label: L) {
        self.0.insert(id.to_string(), label.to_string());
    }

    pub fn remove(&mut self, id: &str) -> Option<String> {
        self.0.remove(id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Ordered filter-key -> token list mapping.
///
/// Keys keep their first-insertion order and a key never holds the same token twice. A key whose
/// token list would become empty is removed instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterQuery {
    entries: Vec<(String, Vec<String>)>,
}

impl FilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the filter part of a query string. Reserved keys are skipped, repeated keys are
    /// merged.
    pub fn parse(query: &str) -> FilterQuery {
        UrlQuery::parse(query).filters
    }

    /// `key=v1,v2&key2=v3`, each key and token percent-encoded on its own.
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(|(key, tokens)| {
                let joined = tokens
                    .iter()
                    .map(|token| encode(token))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}={}", encode(key), joined)
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Joins `path` with this query, omitting the `?` when there is nothing to send.
    pub fn to_path(&self, path: &str) -> String {
        if self.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", self.serialize())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, tokens)| (key.as_str(), tokens.as_slice()))
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.position(key).map(|idx| self.entries[idx].1.as_slice())
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn contains(&self, key: &str, token: &str) -> bool {
        self.get(key)
            .map(|tokens| tokens.iter().any(|t| t == token))
            .unwrap_or(false)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    /// Adds `token` in front of the existing tokens of `key`. Returns false when it was already
    /// present.
    pub fn prepend(&mut self, key: &str, token: &str) -> bool {
        match self.position(key) {
            Some(idx) => {
                let tokens = &mut self.entries[idx].1;
                if tokens.iter().any(|t| t == token) {
                    return false;
                }
                tokens.insert(0, token.to_string());
            }
            None => self
                .entries
                .push((key.to_string(), vec![token.to_string()])),
        }
        true
    }

    fn append(&mut self, key: &str, token: String) {
        match self.position(key) {
            Some(idx) => {
                let tokens = &mut self.entries[idx].1;
                if !tokens.contains(&token) {
                    tokens.push(token);
                }
            }
            None => self.entries.push((key.to_string(), vec![token])),
        }
    }

    /// Makes `token` the only value of `key`. Returns false when that already was the case.
    pub fn replace(&mut self, key: &str, token: &str) -> bool {
        match self.position(key) {
            Some(idx) => {
                let tokens = &mut self.entries[idx].1;
                if tokens.len() == 1 && tokens[0] == token {
                    return false;
                }
                *tokens = vec![token.to_string()];
            }
            None => self
                .entries
                .push((key.to_string(), vec![token.to_string()])),
        }
        true
    }

    pub fn remove_key(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Removes one token, dropping the key once it has no tokens left.
    pub fn remove_token(&mut self, key: &str, token: &str) -> bool {
        let Some(idx) = self.position(key) else {
            return false;
        };
        let tokens = &mut self.entries[idx].1;
        let Some(token_idx) = tokens.iter().position(|t| t == token) else {
            return false;
        };
        tokens.remove(token_idx);
        if tokens.is_empty() {
            self.entries.remove(idx);
        }
        true
    }

    /// Copy of this query without `keys`.
    pub fn without(&self, keys: &[&str]) -> FilterQuery {
        FilterQuery {
            entries: self
                .entries
                .iter()
                .filter(|(key, _)| !keys.contains(&key.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Copy of this query with `key` set to the single value `token`.
    pub fn with(&self, key: &str, token: &str) -> FilterQuery {
        let mut query = self.clone();
        query.replace(key, token);
        query
    }
}

/// A single `key: label` filter chip.
///
/// Keeps the raw key and token so the chip can be removed again without re-parsing its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFilter {
    pub key: String,
    pub token: String,
    pub label: String,
}

impl fmt::Display for AppliedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.label)
    }
}

fn is_numeric_token(token: &str) -> bool {
    let trimmed = token.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().map(|n| !n.is_nan()).unwrap_or(false)
}

/// Projects `filters` into display chips. Numeric tokens are labelled through `meta`, falling
/// back to the raw token; anything else is shown verbatim.
pub fn humanize(filters: &FilterQuery, meta: &MetaData) -> Vec<AppliedFilter> {
    filters
        .iter()
        .filter(|(key, _)| !is_reserved(key))
        .flat_map(|(key, tokens)| {
            tokens.iter().map(move |token| {
                let label = if is_numeric_token(token) {
                    meta.get(token.trim()).unwrap_or(token).to_string()
                } else {
                    token.clone()
                };
                AppliedFilter {
                    key: key.to_string(),
                    token: token.clone(),
                    label,
                }
            })
        })
        .collect()
}

/// Everything the address bar carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlQuery {
    pub filters: FilterQuery,
    pub meta: MetaData,
    /// `None` when the address bar has no `sidebar` key.
    pub sidebar: Option<ListKind>,
}

impl UrlQuery {
    pub fn parse(query: &str) -> UrlQuery {
        let mut parsed = UrlQuery::default();
        for (key, value) in split_pairs(query) {
            match key.as_str() {
                META_DATA_KEY => parsed.meta = MetaData::parse_or_empty(&value),
                SIDEBAR_KEY => {
                    parsed.sidebar = match value.parse::<ListKind>() {
                        Ok(kind) => Some(kind),
                        Err(err) => {
                            tracing::warn!("Falling back to the default list: {err}");
                            None
                        }
                    };
                }
                _ => {
                    for token in split_tokens(&value) {
                        parsed.filters.append(&key, token);
                    }
                }
            }
        }
        parsed
    }

    pub fn serialize(&self) -> String {
        let mut parts = Vec::new();
        if !self.filters.is_empty() {
            parts.push(self.filters.serialize());
        }
        if let Some(kind) = self.sidebar {
            parts.push(format!("{SIDEBAR_KEY}={}", kind.as_token()));
        }
        if !self.meta.is_empty() {
            parts.push(format!("{META_DATA_KEY}={}", encode(&self.meta.to_json())));
        }
        parts.join("&")
    }

    pub fn list_kind(&self) -> ListKind {
        self.sidebar.unwrap_or_default()
    }

    pub fn applied_filters(&self) -> Vec<AppliedFilter> {
        humanize(&self.filters, &self.meta)
    }
}
