//! Local cache: SQLite tables, one typed DAO per entity, and the sync outbox.

mod budget_dao;
mod employee_dao;
mod invoice_dao;
mod leave_dao;
mod outbox;
mod product_dao;
mod quiz_dao;
mod student_dao;
mod teacher_dao;
mod transaction_dao;
mod vendor_dao;

pub use budget_dao::BudgetDao;
pub use employee_dao::EmployeeDao;
pub use invoice_dao::InvoiceDao;
pub use leave_dao::LeaveRequestDao;
pub use outbox::{Outbox, OutboxEntry, OutboxOperation, OutboxStatus};
pub use product_dao::ProductDao;
pub use quiz_dao::QuizDao;
pub use student_dao::StudentDao;
pub use teacher_dao::TeacherDao;
pub use transaction_dao::TransactionDao;
pub use vendor_dao::VendorDao;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;

use crate::models::Entity;

/// Typed access to one entity table.
///
/// Writes take a connection so the repository can run them inside the same
/// transaction as the outbox entry.
pub trait LocalDao<E: Entity>: Send + Sync + 'static {
    fn pool(&self) -> &SqlitePool;

    /// Insert or replace the row for `entity`.
    fn upsert(
        &self,
        conn: &mut SqliteConnection,
        entity: &E,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Returns true if a row was removed.
    fn remove(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    fn find(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> impl Future<Output = Result<Option<E>, sqlx::Error>> + Send;

    fn list(
        &self,
        conn: &mut SqliteConnection,
    ) -> impl Future<Output = Result<Vec<E>, sqlx::Error>> + Send;
}

/// Initialize the database connection pool and run migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!("Opened local cache at {}", path.display());
    Ok(pool)
}

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

pub(crate) fn parse_decimal(value: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(value).map_err(|e| decode_error(format!("invalid decimal '{}': {}", value, e)))
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, sqlx::Error> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| decode_error(format!("invalid date '{}': {}", value, e)))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| decode_error(format!("invalid timestamp '{}': {}", value, e)))
}

/// Parses a status-like column stored with its `Display` text.
pub(crate) fn parse_text<T: FromStr<Err = String>>(value: &str) -> Result<T, sqlx::Error> {
    value.parse().map_err(decode_error)
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(value).map_err(|e| decode_error(format!("invalid JSON column: {}", e)))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tempfile::TempDir;

    /// Pool over a fresh database file. Keep the `TempDir` alive for the test.
    pub async fn test_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        (pool, temp_dir)
    }
}
