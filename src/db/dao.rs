use std::collections::HashSet;

use r2d2_sqlite::SqliteConnectionManager;

use crate::error::{Result, StoreError};
use crate::models::{Article, Location, Topic};

pub type ConnectionPool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// SQL access for one dialect, bound to a single pooled connection for the
/// lifetime of the value. Dropping the DAO returns the connection.
pub trait Dao {
    // Article operations

    fn add_article(&mut self, article: &Article) -> Result<()>;

    fn get_article(&mut self, id: &str) -> Result<Option<Article>>;

    /// Most recently fetched articles first, at most `limit` of them.
    fn get_articles(&mut self, limit: usize) -> Result<Vec<Article>>;

    fn update_article(&mut self, _article: &Article) -> Result<()> {
        Err(StoreError::NotImplemented("full article update"))
    }

    /// Replace the stored content. Returns false when no article has this id.
    fn update_article_content(&mut self, article: &Article) -> Result<bool>;

    fn has_article(&mut self, id: &str) -> Result<bool>;

    // Tag linking

    /// Create missing locations and link every location of `article` to it.
    /// Returns the number of new link rows.
    fn update_location_links(&mut self, article: &Article) -> Result<usize>;

    /// Create missing topics and link every topic of `article` to it.
    /// Returns the number of new link rows.
    fn update_topic_links(&mut self, article: &Article) -> Result<usize>;

    fn get_locations(&mut self, article_id: &str) -> Result<HashSet<Location>>;

    fn get_topics(&mut self, article_id: &str) -> Result<HashSet<Topic>>;

    // Location operations

    fn add_location(&mut self, location: &Location) -> Result<String>;

    fn get_location(&mut self, id: &str) -> Result<Option<Location>>;

    fn has_location(&mut self, id: &str) -> Result<bool>;

    fn has_location_by_name(&mut self, name: &str) -> Result<bool>;

    // Topic operations

    fn add_topic(&mut self, topic: &Topic) -> Result<String>;

    fn get_topic(&mut self, id: &str) -> Result<Option<Topic>>;

    fn has_topic(&mut self, id: &str) -> Result<bool>;

    fn has_topic_by_name(&mut self, name: &str) -> Result<bool>;
}

/// Builds a DAO around a checked-out connection.
pub type DaoFactory = fn(PooledConnection) -> Box<dyn Dao>;
