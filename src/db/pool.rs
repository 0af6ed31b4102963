use r2d2_sqlite::SqliteConnectionManager;

use crate::config::DataSettings;
use crate::error::{Result, StoreError};

use super::dao::ConnectionPool;

/// Build the connection pool described by `settings`. Every connection gets
/// foreign keys, WAL journaling and the configured busy timeout.
pub fn create_pool(settings: &DataSettings) -> Result<ConnectionPool> {
    let path = settings.database_path()?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let busy_timeout = settings.busy_timeout();
    let manager = SqliteConnectionManager::file(&path).with_init(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Ok(())
    });

    r2d2::Pool::builder()
        .max_size(settings.pool_size.max(1))
        .connection_timeout(settings.connection_timeout())
        .build(manager)
        .map_err(|e| StoreError::Connection(format!("{}: {e}", path.display())))
}
