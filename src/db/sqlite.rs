use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{Article, Coordinates, Location, Topic};

use super::dao::{Dao, PooledConnection};

const ARTICLE_COLUMNS: &str =
    "article_id, title, url, release_time, fetch_time, file_hash, article_content";
const LOCATION_COLUMNS: &str = "uuid, location, latitude, longitude, indexed";

pub struct SqliteDao {
    conn: PooledConnection,
}

impl SqliteDao {
    pub fn new(conn: PooledConnection) -> Self {
        Self { conn }
    }

    pub fn boxed(conn: PooledConnection) -> Box<dyn Dao> {
        Box::new(Self::new(conn))
    }
}

impl Dao for SqliteDao {
    // Article operations

    fn add_article(&mut self, article: &Article) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO articles ({ARTICLE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                article.id,
                article.title,
                article.url,
                article.release_time.map(format_timestamp),
                format_timestamp(article.fetch_time),
                article.file_hash,
                article.content,
            ],
        )?;
        Ok(())
    }

    fn get_article(&mut self, id: &str) -> Result<Option<Article>> {
        let article = self
            .conn
            .query_row(
                &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE article_id = ?1"),
                params![id],
                article_from_row,
            )
            .optional()?;
        Ok(article)
    }

    fn get_articles(&mut self, limit: usize) -> Result<Vec<Article>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles ORDER BY fetch_time DESC, article_id LIMIT ?1"
        ))?;
        let articles = stmt
            .query_map(params![limit], article_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(articles)
    }

    fn update_article_content(&mut self, article: &Article) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE articles SET article_content = ?1 WHERE article_id = ?2",
            params![article.content, article.id],
        )?;
        Ok(changed > 0)
    }

    fn has_article(&mut self, id: &str) -> Result<bool> {
        exists(
            &self.conn,
            "SELECT EXISTS(SELECT 1 FROM articles WHERE article_id = ?1)",
            id,
        )
    }

    // Tag linking

    fn update_location_links(&mut self, article: &Article) -> Result<usize> {
        if article.locations.is_empty() {
            return Err(StoreError::Precondition(format!(
                "article {} has no location tags",
                article.id
            )));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut linked = 0;
        for location in &article.locations {
            let location_id = resolve_location(&tx, location)?;
            let inserted = tx.execute(
                "INSERT INTO article_location (article_id, location_uuid) VALUES (?1, ?2)
                 ON CONFLICT(article_id, location_uuid) DO NOTHING",
                params![article.id, location_id],
            )?;
            linked += inserted;
        }
        tx.commit()?;

        tracing::debug!("Linked {} new locations to {}", linked, article.id);
        Ok(linked)
    }

    fn update_topic_links(&mut self, article: &Article) -> Result<usize> {
        if article.topics.is_empty() {
            return Err(StoreError::Precondition(format!(
                "article {} has no topic tags",
                article.id
            )));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut linked = 0;
        for topic in &article.topics {
            let topic_id = resolve_topic(&tx, topic)?;
            let inserted = tx.execute(
                "INSERT INTO article_topic (article_id, topic_uuid) VALUES (?1, ?2)
                 ON CONFLICT(article_id, topic_uuid) DO NOTHING",
                params![article.id, topic_id],
            )?;
            linked += inserted;
        }
        tx.commit()?;

        tracing::debug!("Linked {} new topics to {}", linked, article.id);
        Ok(linked)
    }

    fn get_locations(&mut self, article_id: &str) -> Result<HashSet<Location>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.uuid, l.location, l.latitude, l.longitude, l.indexed
             FROM locations l
             JOIN article_location al ON l.uuid = al.location_uuid
             WHERE al.article_id = ?1",
        )?;
        let locations = stmt
            .query_map(params![article_id], location_from_row)?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(locations)
    }

    fn get_topics(&mut self, article_id: &str) -> Result<HashSet<Topic>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.uuid, t.topic
             FROM topics t
             JOIN article_topic tl ON t.uuid = tl.topic_uuid
             WHERE tl.article_id = ?1",
        )?;
        let topics = stmt
            .query_map(params![article_id], topic_from_row)?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(topics)
    }

    // Location operations

    fn add_location(&mut self, location: &Location) -> Result<String> {
        insert_location(&self.conn, location)
    }

    fn get_location(&mut self, id: &str) -> Result<Option<Location>> {
        let location = self
            .conn
            .query_row(
                &format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE uuid = ?1"),
                params![id],
                location_from_row,
            )
            .optional()?;
        Ok(location)
    }

    fn has_location(&mut self, id: &str) -> Result<bool> {
        exists(
            &self.conn,
            "SELECT EXISTS(SELECT 1 FROM locations WHERE uuid = ?1)",
            id,
        )
    }

    fn has_location_by_name(&mut self, name: &str) -> Result<bool> {
        Ok(find_location_id(&self.conn, name)?.is_some())
    }

    // Topic operations

    fn add_topic(&mut self, topic: &Topic) -> Result<String> {
        insert_topic(&self.conn, topic)
    }

    fn get_topic(&mut self, id: &str) -> Result<Option<Topic>> {
        let topic = self
            .conn
            .query_row(
                "SELECT uuid, topic FROM topics WHERE uuid = ?1",
                params![id],
                topic_from_row,
            )
            .optional()?;
        Ok(topic)
    }

    fn has_topic(&mut self, id: &str) -> Result<bool> {
        exists(
            &self.conn,
            "SELECT EXISTS(SELECT 1 FROM topics WHERE uuid = ?1)",
            id,
        )
    }

    fn has_topic_by_name(&mut self, name: &str) -> Result<bool> {
        Ok(find_topic_id(&self.conn, name)?.is_some())
    }
}

// Resolve-or-create. A concurrent writer may create the same name between the
// lookup and the insert; the unique constraint on the name rejects the second
// insert and the existing row is fetched instead.

fn resolve_location(conn: &Connection, location: &Location) -> Result<String> {
    match find_location_id(conn, &location.name)? {
        Some(id) => Ok(id),
        None => create_location_or_refetch(conn, location),
    }
}

fn create_location_or_refetch(conn: &Connection, location: &Location) -> Result<String> {
    match insert_location(conn, location) {
        Err(err) if err.is_constraint_violation() => {
            tracing::debug!("Location {} was created concurrently", location.name);
            find_location_id(conn, &location.name)?.ok_or(err)
        }
        other => other,
    }
}

fn resolve_topic(conn: &Connection, topic: &Topic) -> Result<String> {
    match find_topic_id(conn, &topic.name)? {
        Some(id) => Ok(id),
        None => create_topic_or_refetch(conn, topic),
    }
}

fn create_topic_or_refetch(conn: &Connection, topic: &Topic) -> Result<String> {
    match insert_topic(conn, topic) {
        Err(err) if err.is_constraint_violation() => {
            tracing::debug!("Topic {} was created concurrently", topic.name);
            find_topic_id(conn, &topic.name)?.ok_or(err)
        }
        other => other,
    }
}

fn insert_location(conn: &Connection, location: &Location) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    match location.coordinates {
        Some(Coordinates {
            latitude,
            longitude,
        }) => conn.execute(
            "INSERT INTO locations (uuid, location, latitude, longitude, indexed)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![id, location.name, latitude, longitude],
        )?,
        None => conn.execute(
            "INSERT INTO locations (uuid, location, indexed) VALUES (?1, ?2, 0)",
            params![id, location.name],
        )?,
    };
    Ok(id)
}

fn insert_topic(conn: &Connection, topic: &Topic) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO topics (uuid, topic) VALUES (?1, ?2)",
        params![id, topic.name],
    )?;
    Ok(id)
}

fn find_location_id(conn: &Connection, name: &str) -> Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT uuid FROM locations WHERE location = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn find_topic_id(conn: &Connection, name: &str) -> Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT uuid FROM topics WHERE topic = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn exists(conn: &Connection, query: &str, key: &str) -> Result<bool> {
    let found: bool = conn.query_row(query, params![key], |row| row.get(0))?;
    Ok(found)
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339 as written by format_timestamp
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let Some(raw) = row.get::<_, Option<String>>(idx)? else {
        return Ok(None);
    };
    parse_datetime(&raw).map(Some).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp {raw}").into(),
        )
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        url: row.get(2)?,
        release_time: timestamp_column(row, 3)?,
        fetch_time: timestamp_column(row, 4)?
            .ok_or(rusqlite::Error::InvalidColumnType(4, "fetch_time".into(), Type::Null))?,
        file_hash: row.get(5)?,
        content: row.get(6)?,
        locations: HashSet::new(),
        topics: HashSet::new(),
    })
}

fn location_from_row(row: &Row) -> rusqlite::Result<Location> {
    let latitude: Option<f64> = row.get(2)?;
    let longitude: Option<f64> = row.get(3)?;
    Ok(Location {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        coordinates: match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        },
        indexed: row.get(4)?,
    })
}

fn topic_from_row(row: &Row) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: Some(row.get(0)?),
        name: row.get(1)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    use super::*;
    use crate::config::DataSettings;
    use crate::db::dao::ConnectionPool;
    use crate::db::pool::create_pool;
    use crate::db::schema::ensure_schema;

    fn test_pool() -> (TempDir, ConnectionPool) {
        let dir = TempDir::new().unwrap();
        let mut settings = DataSettings::for_path(dir.path().join("test.db").to_string_lossy());
        settings.pool_size = 2;
        let pool = create_pool(&settings).unwrap();
        ensure_schema(&mut pool.get().unwrap()).unwrap();
        (dir, pool)
    }

    fn sample_article(id: &str) -> Article {
        Article::new(id, format!("Title {id}"), format!("https://news.example/{id}"))
            .with_content("Full text", "hash-1")
            .with_release_time(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap())
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_article_round_trip() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        let article = sample_article("a1");
        dao.add_article(&article).unwrap();

        let stored = dao.get_article("a1").unwrap().unwrap();
        assert_eq!(stored.title, article.title);
        assert_eq!(stored.url, article.url);
        assert_eq!(stored.release_time, article.release_time);
        assert_eq!(stored.fetch_time, article.fetch_time);
        assert_eq!(stored.file_hash, "hash-1");
        assert_eq!(stored.content, "Full text");
        assert!(dao.get_article("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_article_is_constraint_violation() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        dao.add_article(&sample_article("a1")).unwrap();
        let err = dao.add_article(&sample_article("a1")).unwrap_err();
        assert!(err.is_constraint_violation(), "got {err:?}");
    }

    #[test]
    fn test_update_content_only() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        let article = sample_article("a1");
        dao.add_article(&article).unwrap();

        let mut changed = article.clone();
        changed.title = "Ignored".into();
        changed.file_hash = "ignored".into();
        changed.content = "Rewritten".into();
        assert!(dao.update_article_content(&changed).unwrap());

        let stored = dao.get_article("a1").unwrap().unwrap();
        assert_eq!(stored.content, "Rewritten");
        assert_eq!(stored.title, article.title);
        assert_eq!(stored.file_hash, article.file_hash);
        assert_eq!(stored.fetch_time, article.fetch_time);

        assert!(!dao.update_article_content(&sample_article("nope")).unwrap());
    }

    #[test]
    fn test_full_update_is_not_implemented() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());
        let err = dao.update_article(&sample_article("a1")).unwrap_err();
        assert!(matches!(err, StoreError::NotImplemented(_)));
    }

    #[test]
    fn test_get_articles_newest_first_and_bounded() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        for (i, id) in ["old", "mid", "new"].iter().enumerate() {
            let mut article = sample_article(id);
            article.fetch_time = base + Duration::hours(i as i64);
            dao.add_article(&article).unwrap();
        }

        let ids: Vec<String> = dao
            .get_articles(2)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[test]
    fn test_same_location_for_two_articles() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        let first = sample_article("a1").with_location(Location::new("Berlin"));
        let second = sample_article("a2").with_location(Location::new("Berlin"));
        dao.add_article(&first).unwrap();
        dao.add_article(&second).unwrap();

        assert_eq!(dao.update_location_links(&first).unwrap(), 1);
        assert_eq!(dao.update_location_links(&second).unwrap(), 1);

        assert_eq!(count(&dao.conn, "locations"), 1);
        assert_eq!(count(&dao.conn, "article_location"), 2);
    }

    #[test]
    fn test_relinking_same_pair_keeps_one_row() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        let article = sample_article("a1")
            .with_topic(Topic::new("economy"))
            .with_topic(Topic::new("energy"));
        dao.add_article(&article).unwrap();

        assert_eq!(dao.update_topic_links(&article).unwrap(), 2);
        assert_eq!(dao.update_topic_links(&article).unwrap(), 0);

        assert_eq!(count(&dao.conn, "topics"), 2);
        assert_eq!(count(&dao.conn, "article_topic"), 2);
        let names: HashSet<String> = dao
            .get_topics("a1")
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, HashSet::from(["economy".to_string(), "energy".to_string()]));
    }

    #[test]
    fn test_coordinates_are_kept_or_left_null() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        let article = sample_article("a1")
            .with_location(Location::new("Oslo").with_coordinates(59.91, 10.75))
            .with_location(Location::new("Somewhere"));
        dao.add_article(&article).unwrap();
        dao.update_location_links(&article).unwrap();

        let locations = dao.get_locations("a1").unwrap();
        assert_eq!(locations.len(), 2);
        for location in locations {
            assert!(!location.indexed);
            assert!(location.id.is_some());
            match location.name.as_str() {
                "Oslo" => {
                    let coords = location.coordinates.unwrap();
                    assert_eq!(coords.latitude, 59.91);
                    assert_eq!(coords.longitude, 10.75);
                }
                _ => assert!(location.coordinates.is_none()),
            }
        }
    }

    #[test]
    fn test_empty_tag_set_is_precondition_error() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        let article = sample_article("a1");
        dao.add_article(&article).unwrap();

        assert!(matches!(
            dao.update_location_links(&article),
            Err(StoreError::Precondition(_))
        ));
        assert!(matches!(
            dao.update_topic_links(&article),
            Err(StoreError::Precondition(_))
        ));
    }

    #[test]
    fn test_linking_unknown_article_rolls_back() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        let article = sample_article("ghost").with_location(Location::new("Lima"));
        let err = dao.update_location_links(&article).unwrap_err();

        assert!(err.is_constraint_violation(), "got {err:?}");
        assert!(!dao.has_location_by_name("Lima").unwrap());
    }

    #[test]
    fn test_create_falls_back_to_existing_row() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        let existing = dao.add_location(&Location::new("Rome")).unwrap();
        let resolved = create_location_or_refetch(&dao.conn, &Location::new("Rome")).unwrap();
        assert_eq!(resolved, existing);

        let topic = dao.add_topic(&Topic::new("sports")).unwrap();
        let resolved = create_topic_or_refetch(&dao.conn, &Topic::new("sports")).unwrap();
        assert_eq!(resolved, topic);

        assert_eq!(count(&dao.conn, "locations"), 1);
        assert_eq!(count(&dao.conn, "topics"), 1);
    }

    #[test]
    fn test_tag_crud_and_predicates() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        let location_id = dao.add_location(&Location::new("Cairo")).unwrap();
        assert!(dao.has_location(&location_id).unwrap());
        assert!(dao.has_location_by_name("Cairo").unwrap());
        assert!(!dao.has_location("unknown").unwrap());
        assert!(!dao.has_location_by_name("Giza").unwrap());
        let location = dao.get_location(&location_id).unwrap().unwrap();
        assert_eq!(location.name, "Cairo");
        assert_eq!(location.id.as_deref(), Some(location_id.as_str()));

        let err = dao.add_location(&Location::new("Cairo")).unwrap_err();
        assert!(err.is_constraint_violation());

        let topic_id = dao.add_topic(&Topic::new("science")).unwrap();
        assert!(dao.has_topic(&topic_id).unwrap());
        assert!(dao.has_topic_by_name("science").unwrap());
        assert!(!dao.has_topic_by_name("art").unwrap());
        assert_eq!(dao.get_topic(&topic_id).unwrap().unwrap().name, "science");
        assert!(dao.get_topic("unknown").unwrap().is_none());
    }

    #[test]
    fn test_no_links_gives_empty_sets() {
        let (_dir, pool) = test_pool();
        let mut dao = SqliteDao::new(pool.get().unwrap());

        dao.add_article(&sample_article("a1")).unwrap();
        assert!(dao.get_locations("a1").unwrap().is_empty());
        assert!(dao.get_topics("a1").unwrap().is_empty());
    }
}
