use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::query::ListKind;

/// State changes a user can apply to a single bookmark card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookmarkAction {
    Favorite(bool),
    Archive,
    /// Move to trash.
    Delete,
    /// Move an archived bookmark to trash.
    DeleteArchived,
    PermanentDelete,
    /// Bring a trashed bookmark back.
    Restore,
    /// Toggle a reading-list item between done and pending.
    MarkDone(bool),
}

impl BookmarkAction {
    pub fn method(&self) -> Method {
        match self {
            BookmarkAction::Favorite(_) | BookmarkAction::Archive | BookmarkAction::MarkDone(_) => {
                Method::PATCH
            }
            BookmarkAction::Delete
            | BookmarkAction::DeleteArchived
            | BookmarkAction::PermanentDelete => Method::DELETE,
            BookmarkAction::Restore => Method::GET,
        }
    }

    pub fn path(&self, id: i64) -> String {
        match self {
            BookmarkAction::DeleteArchived => format!("/bm/bookmark/{id}/archived-delete/"),
            BookmarkAction::PermanentDelete => format!("/bm/bookmark/{id}/permanent-delete/"),
            BookmarkAction::Restore => format!("/bm/bookmark/{id}/restore/"),
            _ => format!("/bm/bookmark/{id}/"),
        }
    }

    pub fn body(&self) -> Option<serde_json::Value> {
        match self {
            BookmarkAction::Favorite(favorite) => Some(json!({ "favorite": favorite })),
            BookmarkAction::Archive => Some(json!({ "hidden": true })),
            BookmarkAction::MarkDone(done) => Some(json!({ "user_status": if *done { 2 } else { 1 } })),
            _ => None,
        }
    }

    /// Whether a successful action moves the bookmark out of a `kind` list.
    pub fn removes_from(&self, kind: ListKind) -> bool {
        match self {
            BookmarkAction::Favorite(favorite) => !favorite && kind == ListKind::Favorite,
            BookmarkAction::Archive => kind != ListKind::Archived,
            BookmarkAction::Delete => kind != ListKind::Trashed,
            BookmarkAction::DeleteArchived | BookmarkAction::PermanentDelete => true,
            BookmarkAction::Restore => kind == ListKind::Trashed,
            BookmarkAction::MarkDone(_) => false,
        }
    }
}
