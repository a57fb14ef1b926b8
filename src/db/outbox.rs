//! Queued remote writes. Entries are written in the same transaction as the
//! local change they mirror and drained by the sync worker.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use std::collections::HashSet;

use super::{parse_text, parse_timestamp};
use crate::models::Collection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxOperation {
    Upsert,
    Delete,
}

crate::models::text_enum!(OutboxOperation {
    Upsert => "upsert",
    Delete => "delete",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    /// Rejected permanently by the remote store; kept until retried by hand.
    Failed,
}

crate::models::text_enum!(OutboxStatus {
    Pending => "pending",
    Failed => "failed",
});

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub seq: i64,
    pub collection: Collection,
    pub document_id: String,
    pub operation: OutboxOperation,
    /// JSON document for upserts.
    pub payload: Option<String>,
    pub status: OutboxStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    seq: i64,
    collection: String,
    document_id: String,
    operation: String,
    payload: Option<String>,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    enqueued_at: String,
    updated_at: String,
}

impl TryFrom<OutboxRow> for OutboxEntry {
    type Error = sqlx::Error;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        let collection = Collection::parse(&row.collection).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown collection '{}'", row.collection).into())
        })?;
        Ok(OutboxEntry {
            seq: row.seq,
            collection,
            document_id: row.document_id,
            operation: parse_text(&row.operation)?,
            payload: row.payload,
            status: parse_text(&row.status)?,
            attempts: row.attempts,
            last_error: row.last_error,
            enqueued_at: parse_timestamp(&row.enqueued_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(Clone)]
pub struct Outbox {
    pool: SqlitePool,
}

impl Outbox {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Queue a remote write. Earlier entries for the same document are
    /// dropped so only the latest intent is pushed.
    pub async fn enqueue(
        &self,
        conn: &mut SqliteConnection,
        collection: Collection,
        document_id: &str,
        operation: OutboxOperation,
        payload: Option<String>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query("DELETE FROM sync_outbox WHERE collection = ? AND document_id = ?")
            .bind(collection.path())
            .bind(document_id)
            .execute(&mut *conn)
            .await?;

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO sync_outbox (collection, document_id, operation, payload, status, attempts, enqueued_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(collection.path())
        .bind(document_id)
        .bind(operation.to_string())
        .bind(payload)
        .bind(OutboxStatus::Pending.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Oldest pending entries first.
    pub async fn pending(&self, limit: i64) -> Result<Vec<OutboxEntry>, sqlx::Error> {
        let rows: Vec<OutboxRow> =
            sqlx::query_as("SELECT * FROM sync_outbox WHERE status = ? ORDER BY seq LIMIT ?")
                .bind(OutboxStatus::Pending.to_string())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    pub async fn mark_done(&self, seq: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sync_outbox WHERE seq = ?")
            .bind(seq)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Count an attempt against `seq`. Permanent failures move the entry to
    /// the failed state so the drain can move past it.
    pub async fn record_failure(&self, seq: i64, error: &str, permanent: bool) -> Result<(), sqlx::Error> {
        let status = if permanent {
            OutboxStatus::Failed
        } else {
            OutboxStatus::Pending
        };
        sqlx::query(
            "UPDATE sync_outbox SET attempts = attempts + 1, last_error = ?, status = ?, updated_at = ? WHERE seq = ?",
        )
        .bind(error)
        .bind(status.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(seq)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn pending_count(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_outbox WHERE status = ?")
            .bind(OutboxStatus::Pending.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn failed(&self) -> Result<Vec<OutboxEntry>, sqlx::Error> {
        let rows: Vec<OutboxRow> = sqlx::query_as("SELECT * FROM sync_outbox WHERE status = ? ORDER BY seq")
            .bind(OutboxStatus::Failed.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    /// Put failed entries back in the queue. Returns how many were requeued.
    pub async fn retry_failed(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sync_outbox SET status = ?, attempts = 0, updated_at = ? WHERE status = ?",
        )
        .bind(OutboxStatus::Pending.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(OutboxStatus::Failed.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Ids with any outbox entry in `collection`. Pull leaves these alone so
    /// unpushed local changes are not overwritten; it must read them on the
    /// connection that applies the snapshot.
    pub async fn protected_ids(
        &self,
        conn: &mut SqliteConnection,
        collection: Collection,
    ) -> Result<HashSet<String>, sqlx::Error> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT document_id FROM sync_outbox WHERE collection = ?")
                .bind(collection.path())
                .fetch_all(&mut *conn)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;

    #[tokio::test]
    async fn test_enqueue_coalesces_per_document() {
        let (pool, _temp) = test_pool().await;
        let outbox = Outbox::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        outbox
            .enqueue(&mut conn, Collection::Students, "s-1", OutboxOperation::Upsert, Some("{}".into()))
            .await
            .unwrap();
        outbox
            .enqueue(&mut conn, Collection::Students, "s-2", OutboxOperation::Upsert, Some("{}".into()))
            .await
            .unwrap();
        outbox
            .enqueue(&mut conn, Collection::Students, "s-1", OutboxOperation::Delete, None)
            .await
            .unwrap();

        let pending = outbox.pending(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].document_id, "s-2");
        assert_eq!(pending[1].document_id, "s-1");
        assert_eq!(pending[1].operation, OutboxOperation::Delete);
        assert_eq!(pending[1].payload, None);
    }

    #[tokio::test]
    async fn test_failures_and_retry() {
        let (pool, _temp) = test_pool().await;
        let outbox = Outbox::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        let transient = outbox
            .enqueue(&mut conn, Collection::Products, "p-1", OutboxOperation::Upsert, Some("{}".into()))
            .await
            .unwrap();
        let permanent = outbox
            .enqueue(&mut conn, Collection::Products, "p-2", OutboxOperation::Upsert, Some("{}".into()))
            .await
            .unwrap();

        outbox.record_failure(transient, "connection refused", false).await.unwrap();
        outbox.record_failure(permanent, "HTTP 400: bad document", true).await.unwrap();

        assert_eq!(outbox.pending_count().await.unwrap(), 1);
        let pending = outbox.pending(10).await.unwrap();
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("connection refused"));

        let failed = outbox.failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].document_id, "p-2");
        assert_eq!(failed[0].status, OutboxStatus::Failed);

        let protected = outbox.protected_ids(&mut conn, Collection::Products).await.unwrap();
        assert!(protected.contains("p-1") && protected.contains("p-2"));
        assert!(outbox
            .protected_ids(&mut conn, Collection::Vendors)
            .await
            .unwrap()
            .is_empty());

        assert_eq!(outbox.retry_failed().await.unwrap(), 1);
        assert_eq!(outbox.pending_count().await.unwrap(), 2);

        outbox.mark_done(transient).await.unwrap();
        outbox.mark_done(permanent).await.unwrap();
        assert_eq!(outbox.pending_count().await.unwrap(), 0);
    }
}
