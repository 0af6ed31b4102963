use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Location, Topic};

/// A fetched news article. The id is assigned by the ingestion pipeline
/// (typically a stable hash of the source URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: String,
    pub release_time: Option<DateTime<Utc>>,
    pub fetch_time: DateTime<Utc>,
    pub file_hash: String,
    pub content: String,
    #[serde(default)]
    pub locations: HashSet<Location>,
    #[serde(default)]
    pub topics: HashSet<Topic>,
}

impl Article {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            release_time: None,
            fetch_time: Utc::now(),
            file_hash: String::new(),
            content: String::new(),
            locations: HashSet::new(),
            topics: HashSet::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>, file_hash: impl Into<String>) -> Self {
        self.content = content.into();
        self.file_hash = file_hash.into();
        self
    }

    pub fn with_release_time(mut self, release_time: DateTime<Utc>) -> Self {
        self.release_time = Some(release_time);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.insert(location);
        self
    }

    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topics.insert(topic);
        self
    }
}
