use std::collections::HashSet;

use crate::config::DataSettings;
use crate::error::{Result, StoreError};
use crate::models::{Article, Location, Topic};

use super::dao::{ConnectionPool, Dao, DaoFactory};
use super::pool::create_pool;
use super::registry::DialectRegistry;
use super::schema;

struct Backend {
    pool: ConnectionPool,
    factory: DaoFactory,
    dialect: String,
}

enum State {
    Uninitialized,
    Ready(Backend),
    Closed,
}

/// Entry point for the ingestion pipeline. Owns the pool and hands out one
/// DAO per operation; the DAO (and its connection) is released when the
/// operation returns, whatever the outcome.
pub struct DataManager {
    registry: DialectRegistry,
    state: State,
    span: tracing::Span,
}

impl Default for DataManager {
    fn default() -> Self {
        Self::new(DialectRegistry::with_builtin())
    }
}

impl DataManager {
    pub fn new(registry: DialectRegistry) -> Self {
        Self {
            registry,
            state: State::Uninitialized,
            span: tracing::info_span!("data_manager", dialect = tracing::field::Empty),
        }
    }

    /// Connect, detect the dialect and bootstrap the schema. Failures are
    /// logged and reported as `false`; use `try_initialize` for the error.
    pub fn initialize(&mut self, settings: &DataSettings) -> bool {
        match self.try_initialize(settings) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Could not initialize data manager: {}", e);
                false
            }
        }
    }

    pub fn try_initialize(&mut self, settings: &DataSettings) -> Result<()> {
        if matches!(self.state, State::Closed) {
            return Err(StoreError::Closed);
        }
        let _entered = self.span.enter();
        tracing::info!("Connecting to database...");

        let pool = create_pool(settings)?;
        let mut conn = pool.get()?;

        let dialect = schema::detect_dialect(&conn)?;
        let factory = self
            .registry
            .resolve(&dialect)
            .ok_or_else(|| StoreError::UnsupportedDialect(dialect.clone()))?;
        tracing::debug!("Found supported database implementation: {}", dialect);

        schema::ensure_schema(&mut conn)?;
        drop(conn);

        self.span.record("dialect", dialect.as_str());
        tracing::info!("Connected to database ({})", dialect);
        self.state = State::Ready(Backend {
            pool,
            factory,
            dialect,
        });
        Ok(())
    }

    /// Release the pool. No operation may be issued afterwards.
    pub fn close(&mut self) {
        if let State::Ready(backend) = std::mem::replace(&mut self.state, State::Closed) {
            let _entered = self.span.enter();
            drop(backend);
            tracing::info!("Data source closed");
        }
    }

    pub fn dialect(&self) -> Option<&str> {
        match &self.state {
            State::Ready(backend) => Some(&backend.dialect),
            _ => None,
        }
    }

    fn backend(&self) -> Result<&Backend> {
        match &self.state {
            State::Ready(backend) => Ok(backend),
            State::Uninitialized => Err(StoreError::NotInitialized),
            State::Closed => Err(StoreError::Closed),
        }
    }

    /// Check out a connection, wrap it in a DAO and run `op` against it.
    fn with_dao<T>(
        &self,
        name: &'static str,
        op: impl FnOnce(&mut dyn Dao) -> Result<T>,
    ) -> Result<T> {
        let _entered = self.span.enter();
        let backend = self.backend()?;
        let mut dao = (backend.factory)(backend.pool.get()?);

        let result = op(dao.as_mut());
        if let Err(e) = &result {
            tracing::debug!(operation = name, "Operation failed: {}", e);
        }
        result
    }

    // Article operations

    pub fn add_article(&self, article: &Article) -> Result<()> {
        self.with_dao("add_article", |dao| dao.add_article(article))
    }

    /// Look up an article; with `load_tags` its locations and topics are
    /// filled from the link tables on the same connection.
    pub fn get_article(&self, id: &str, load_tags: bool) -> Result<Option<Article>> {
        self.with_dao("get_article", |dao| {
            let Some(mut article) = dao.get_article(id)? else {
                return Ok(None);
            };
            if load_tags {
                article.locations = dao.get_locations(&article.id)?;
                article.topics = dao.get_topics(&article.id)?;
            }
            Ok(Some(article))
        })
    }

    pub fn get_articles(&self, limit: usize) -> Result<Vec<Article>> {
        self.with_dao("get_articles", |dao| dao.get_articles(limit))
    }

    pub fn update_article(&self, article: &Article) -> Result<()> {
        self.with_dao("update_article", |dao| dao.update_article(article))
    }

    pub fn update_article_content(&self, article: &Article) -> Result<bool> {
        self.with_dao("update_article_content", |dao| {
            dao.update_article_content(article)
        })
    }

    pub fn has_article(&self, id: &str) -> Result<bool> {
        self.with_dao("has_article", |dao| dao.has_article(id))
    }

    // Tag linking

    pub fn update_location_links(&self, article: &Article) -> Result<usize> {
        self.with_dao("update_location_links", |dao| {
            dao.update_location_links(article)
        })
    }

    pub fn update_topic_links(&self, article: &Article) -> Result<usize> {
        self.with_dao("update_topic_links", |dao| dao.update_topic_links(article))
    }

    pub fn get_locations(&self, article_id: &str) -> Result<HashSet<Location>> {
        self.with_dao("get_locations", |dao| dao.get_locations(article_id))
    }

    pub fn get_topics(&self, article_id: &str) -> Result<HashSet<Topic>> {
        self.with_dao("get_topics", |dao| dao.get_topics(article_id))
    }

    // Location operations

    pub fn add_location(&self, location: &Location) -> Result<String> {
        self.with_dao("add_location", |dao| dao.add_location(location))
    }

    pub fn get_location(&self, id: &str) -> Result<Option<Location>> {
        self.with_dao("get_location", |dao| dao.get_location(id))
    }

    pub fn has_location(&self, id: &str) -> Result<bool> {
        self.with_dao("has_location", |dao| dao.has_location(id))
    }

    pub fn has_location_by_name(&self, name: &str) -> Result<bool> {
        self.with_dao("has_location_by_name", |dao| dao.has_location_by_name(name))
    }

    // Topic operations

    pub fn add_topic(&self, topic: &Topic) -> Result<String> {
        self.with_dao("add_topic", |dao| dao.add_topic(topic))
    }

    pub fn get_topic(&self, id: &str) -> Result<Option<Topic>> {
        self.with_dao("get_topic", |dao| dao.get_topic(id))
    }

    pub fn has_topic(&self, id: &str) -> Result<bool> {
        self.with_dao("has_topic", |dao| dao.has_topic(id))
    }

    pub fn has_topic_by_name(&self, name: &str) -> Result<bool> {
        self.with_dao("has_topic_by_name", |dao| dao.has_topic_by_name(name))
    }
}
