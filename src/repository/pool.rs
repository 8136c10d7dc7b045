//! SQLite connection pool.
//!
//! Connections are async wrappers over Diesel's synchronous SQLite
//! connection, created on demand. All repository code goes through
//! [`with_conn!`] so the pooling strategy stays in one place.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::AsyncConnection;

use super::util::to_diesel_error;

/// Diesel error type alias.
pub type DieselError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// SQLite connection pool (lightweight - creates connections on demand).
#[derive(Clone)]
pub struct DbPool {
    database_url: String,
}

impl DbPool {
    /// Create a new pool from a database URL.
    ///
    /// Accepts `sqlite:path` URLs or bare file paths.
    pub fn from_url(database_url: &str) -> Self {
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    /// Create a pool from a file path.
    pub fn from_path(path: &Path) -> Self {
        Self::from_url(&path.display().to_string())
    }

    /// Get a connection.
    pub async fn get(&self) -> Result<SqliteConn, DieselError> {
        SqliteConn::establish(&self.database_url)
            .await
            .map_err(to_diesel_error)
    }

    /// Get the database URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// Macro for running database operations on a pooled connection.
///
/// # Example
/// ```ignore
/// with_conn!(self.pool, conn, {
///     buildings::table.load::<BuildingRecord>(&mut conn).await
/// })
/// ```
#[macro_export]
macro_rules! with_conn {
    ($pool:expr, $conn:ident, $body:expr) => {{
        let mut $conn = $pool.get().await?;
        $body
    }};
}

#[allow(unused_imports)]
pub use with_conn;
