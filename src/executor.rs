//! SQL execution over `may_postgres`.
//!
//! [`SqlExecutor`] is the seam between [`PostgresStore`](crate::store::PostgresStore)
//! and the database client. Each call is timed, counted and wrapped in a
//! tracing span when the corresponding features are enabled.

use crate::store::StoreError;
use may_postgres::types::ToSql;
use may_postgres::{Client, Row};
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Trait for executing SQL statements
///
/// Implementations may wrap a direct client, a pooled connection or a test
/// double; the store only relies on these three calls.
pub trait SqlExecutor: Send + Sync {
    /// Execute a statement and return the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the statement fails.
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, StoreError>;

    /// Execute a query that must return exactly one row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails or does not return exactly one row.
    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, StoreError>;

    /// Execute a query and return every row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, StoreError>;
}

/// Implementation of `SqlExecutor` for `may_postgres::Client`
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn into_client(self) -> Client {
        self.client
    }

    /// Run `SELECT 1` against the connection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the connection does not answer.
    pub fn check_health(&self) -> Result<bool, StoreError> {
        let row = self.query_one("SELECT 1", &[])?;
        let one: i32 = row
            .try_get(0)
            .map_err(|e| StoreError::Parse(format!("health check: {e}")))?;
        Ok(one == 1)
    }

    fn timed<T>(
        &self,
        query: &str,
        run: impl FnOnce(&Client) -> Result<T, may_postgres::Error>,
    ) -> Result<T, StoreError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::execute_query_span(query).entered();

        log::debug!("executing: {query}");
        let start = Instant::now();
        let result = run(&self.client).map_err(|e| {
            #[cfg(feature = "metrics")]
            METRICS.record_query_error();
            log::debug!("query failed: {e}");
            StoreError::Postgres(e)
        });

        let _duration = start.elapsed();
        #[cfg(feature = "metrics")]
        METRICS.record_query_duration(_duration);

        result
    }
}

impl SqlExecutor for MayPostgresExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, StoreError> {
        self.timed(query, |client| client.execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, StoreError> {
        self.timed(query, |client| client.query_one(query, params))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, StoreError> {
        self.timed(query, |client| client.query(query, params))
    }
}
