use std::collections::HashMap;

use super::dao::DaoFactory;
use super::sqlite::SqliteDao;

/// Maps a lower-cased database product name to the DAO implementation for it.
#[derive(Clone, Default)]
pub struct DialectRegistry {
    factories: HashMap<String, DaoFactory>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every dialect this crate ships.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("sqlite", SqliteDao::boxed);
        registry
    }

    pub fn register(&mut self, name: &str, factory: DaoFactory) {
        let name = name.to_lowercase();
        if self.factories.insert(name.clone(), factory).is_some() {
            tracing::warn!("Replaced DAO implementation for {}", name);
        }
    }

    pub fn resolve(&self, name: &str) -> Option<DaoFactory> {
        self.factories.get(&name.to_lowercase()).copied()
    }

    pub fn dialects(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialectRegistry")
            .field("dialects", &self.dialects())
            .finish()
    }
}
