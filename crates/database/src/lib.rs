//! Parley Database Crate
//!
//! SQLite connection management, embedded migrations, and the message store
//! used by the delivery pipeline.

use parley_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod store;
pub mod types;

pub use connection::prepare_database;
pub use entities::{format_timestamp, Message, MessageContent, NewMessage};
pub use migrations::{run_migrations, MIGRATOR};
pub use repos::MessageRepository;
pub use store::MessageStore;
pub use types::{DatabaseError, DatabaseResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}
