//! Article and tag persistence for the bluelight ingestion pipeline.
//!
//! [`DataManager`] is the entry point: it bootstraps the schema for the
//! detected database dialect and exposes article, location and topic
//! operations, each run on its own pooled connection.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, DataSettings};
pub use db::{DataManager, DialectRegistry};
pub use error::{Result, StoreError};
pub use models::{Article, Coordinates, Location, Topic};
