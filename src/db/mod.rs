mod dao;
mod manager;
mod pool;
mod registry;
pub mod schema;
mod sqlite;

pub use dao::{ConnectionPool, Dao, DaoFactory, PooledConnection};
pub use manager::DataManager;
pub use pool::create_pool;
pub use registry::DialectRegistry;
pub use sqlite::SqliteDao;
