use chrono::NaiveDate;
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;

use super::{parse_date, parse_decimal, parse_text, parse_timestamp, LocalDao};
use crate::models::{Transaction, TransactionKind};

pub struct TransactionDao {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: String,
    kind: String,
    amount: String,
    category: String,
    description: String,
    date: String,
    reference_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = sqlx::Error;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            kind: parse_text(&row.kind)?,
            amount: parse_decimal(&row.amount)?,
            category: row.category,
            description: row.description,
            date: parse_date(&row.date)?,
            reference_id: row.reference_id,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl TransactionDao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_by_kind(&self, kind: TransactionKind) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows: Vec<TransactionRow> =
            sqlx::query_as("SELECT * FROM transactions WHERE kind = ? ORDER BY date, created_at")
                .bind(kind.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    /// Transactions dated within `from..=to`.
    pub async fn list_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            "SELECT * FROM transactions WHERE date >= ? AND date <= ? ORDER BY date, created_at",
        )
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }
}

impl LocalDao<Transaction> for TransactionDao {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert(
        &self,
        conn: &mut SqliteConnection,
        tx: &Transaction,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO transactions (id, kind, amount, category, description, date, reference_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tx.id)
        .bind(tx.kind.to_string())
        .bind(tx.amount.to_string())
        .bind(&tx.category)
        .bind(&tx.description)
        .bind(tx.date.to_string())
        .bind(&tx.reference_id)
        .bind(tx.created_at.to_rfc3339())
        .bind(tx.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let row: Option<TransactionRow> = sqlx::query_as("SELECT * FROM transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Transaction::try_from).transpose()
    }

    async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<Transaction>, sqlx::Error> {
        let rows: Vec<TransactionRow> =
            sqlx::query_as("SELECT * FROM transactions ORDER BY date, created_at")
                .fetch_all(&mut *conn)
                .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }
}
