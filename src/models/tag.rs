use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A place mentioned by an article. Identity is the name; `id` is only known
/// once the row exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    /// Set by the external indexer, never by this crate.
    #[serde(default)]
    pub indexed: bool,
}

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            coordinates: None,
            indexed: false,
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.coordinates = Some(Coordinates { latitude, longitude });
        self
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Topic {}

impl Hash for Topic {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn tag_sets_dedupe_by_name() {
        let mut set = HashSet::new();
        set.insert(Location::new("Berlin"));
        set.insert(Location::new("Berlin").with_coordinates(52.52, 13.405));
        set.insert(Location::new("Paris"));
        assert_eq!(set.len(), 2);

        let mut topics = HashSet::new();
        topics.insert(Topic::new("politics"));
        topics.insert(Topic {
            id: Some("x".into()),
            name: "politics".into(),
        });
        assert_eq!(topics.len(), 1);
    }

    #[test]
    fn location_deserializes_without_optional_fields() {
        let loc: Location = serde_json::from_str(r#"{"name":"Oslo"}"#).unwrap();
        assert_eq!(loc.name, "Oslo");
        assert!(loc.coordinates.is_none());
        assert!(!loc.indexed);
    }
}
