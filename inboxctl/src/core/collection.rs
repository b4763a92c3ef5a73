//! Correlation of a purchase list against queue state by job id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::job_id::job_id_for_url;
use crate::core::types::Queue;

/// One purchased item as exported by the collection scraper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CollectionItem {
    #[serde(default)]
    pub item_url: Option<String>,
    #[serde(default)]
    pub band_name: Option<String>,
    #[serde(default)]
    pub item_title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Downloaded,
    Pending,
    InProgress,
    Failed,
    Unknown,
}

impl From<Queue> for ItemStatus {
    fn from(queue: Queue) -> Self {
        match queue {
            Queue::Done => ItemStatus::Downloaded,
            Queue::Pending => ItemStatus::Pending,
            Queue::InProgress => ItemStatus::InProgress,
            Queue::Failed => ItemStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionRow {
    pub artist: String,
    pub title: String,
    pub status: ItemStatus,
    pub url: Option<String>,
}

/// Annotate each item with the queue currently holding its job.
///
/// `locations` maps job id to queue. Items without a URL, or whose job is in no
/// queue, are `Unknown`.
pub fn correlate(items: &[CollectionItem], locations: &HashMap<String, Queue>) -> Vec<CollectionRow> {
    items
        .iter()
        .map(|item| {
            let status = item
                .item_url
                .as_deref()
                .and_then(job_id_for_url)
                .and_then(|id| locations.get(&id).copied())
                .map_or(ItemStatus::Unknown, ItemStatus::from);
            CollectionRow {
                artist: item
                    .band_name
                    .clone()
                    .unwrap_or_else(|| "Unknown Artist".to_string()),
                title: item
                    .item_title
                    .clone()
                    .unwrap_or_else(|| "Unknown Title".to_string()),
                status,
                url: item.item_url.clone(),
            }
        })
        .collect()
}
