use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    query::FilterQuery,
    source::{BookmarkSource, PagedFetcher},
    FacetError,
};

pub const TAG_LIST_PATH: &str = "/bm/tag/list/";

const MAX_REM: f64 = 2.5;
const MIN_REM: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub weight: f64,
}

/// Tags with their weights rescaled to font sizes in rem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagCloud {
    pub tags: Vec<Tag>,
}

impl TagCloud {
    pub async fn load<S: BookmarkSource>(source: Arc<S>) -> Result<TagCloud, FacetError> {
        let tags = PagedFetcher::new(source)
            .fetch_list::<Tag>(TAG_LIST_PATH, &FilterQuery::new())
            .await?;
        Ok(TagCloud::from_weights(tags))
    }

    /// Spreads `tags` linearly over `[0.5, 3.0]` rem, the heaviest tag taking the maximum.
    pub fn from_weights(mut tags: Vec<Tag>) -> TagCloud {
        let steps = tags.len() as f64;
        let max_weight = tags.iter().map(|tag| tag.weight).fold(0.0, f64::max);
        if max_weight <= 0.0 {
            for tag in tags.iter_mut() {
                tag.weight = MIN_REM;
            }
            return TagCloud { tags };
        }
        let weight_step = max_weight / steps;
        let rem_step = MAX_REM / steps;
        for tag in tags.iter_mut() {
            let size = tag.weight / weight_step * rem_step + MIN_REM;
            tag.weight = (size * 100.0).round() / 100.0;
        }
        TagCloud { tags }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
