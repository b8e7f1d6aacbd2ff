//! Database layer
//!
//! SQLite storage for the CMS. Repositories receive a `DynDatabasePool` and
//! issue their queries through `pool.sqlite()`.
//!
//! # Usage
//!
//! ```ignore
//! use lavamedia::config::DatabaseConfig;
//! use lavamedia::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, SqliteDatabase};

/// Whether an error chain bottoms out in a SQLite UNIQUE/PRIMARY KEY violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
    })
}

/// Whether an error chain bottoms out in a foreign key violation
pub fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .map(|db| db.is_foreign_key_violation())
            .unwrap_or(false)
    })
}
