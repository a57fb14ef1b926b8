use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;

use super::{parse_date, parse_text, parse_timestamp, LocalDao};
use crate::models::{LeaveRequest, LeaveStatus};

pub struct LeaveRequestDao {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct LeaveRequestRow {
    id: String,
    employee_id: String,
    leave_type: String,
    start_date: String,
    end_date: String,
    reason: String,
    status: String,
    reviewed_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = sqlx::Error;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            leave_type: parse_text(&row.leave_type)?,
            start_date: parse_date(&row.start_date)?,
            end_date: parse_date(&row.end_date)?,
            reason: row.reason,
            status: parse_text(&row.status)?,
            reviewed_by: row.reviewed_by,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl LeaveRequestDao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_pending(&self) -> Result<Vec<LeaveRequest>, sqlx::Error> {
        self.list_by_status(LeaveStatus::Pending).await
    }

    pub async fn list_by_status(&self, status: LeaveStatus) -> Result<Vec<LeaveRequest>, sqlx::Error> {
        let rows: Vec<LeaveRequestRow> =
            sqlx::query_as("SELECT * FROM leave_requests WHERE status = ? ORDER BY start_date")
                .bind(status.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(LeaveRequest::try_from).collect()
    }

    pub async fn list_for_employee(&self, employee_id: &str) -> Result<Vec<LeaveRequest>, sqlx::Error> {
        let rows: Vec<LeaveRequestRow> =
            sqlx::query_as("SELECT * FROM leave_requests WHERE employee_id = ? ORDER BY start_date")
                .bind(employee_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(LeaveRequest::try_from).collect()
    }
}

impl LocalDao<LeaveRequest> for LeaveRequestDao {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert(&self, conn: &mut SqliteConnection, leave: &LeaveRequest) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO leave_requests (id, employee_id, leave_type, start_date, end_date, reason, status, reviewed_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&leave.id)
        .bind(&leave.employee_id)
        .bind(leave.leave_type.to_string())
        .bind(leave.start_date.to_string())
        .bind(leave.end_date.to_string())
        .bind(&leave.reason)
        .bind(leave.status.to_string())
        .bind(&leave.reviewed_by)
        .bind(leave.created_at.to_rfc3339())
        .bind(leave.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM leave_requests WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<LeaveRequest>, sqlx::Error> {
        let row: Option<LeaveRequestRow> = sqlx::query_as("SELECT * FROM leave_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(LeaveRequest::try_from).transpose()
    }

    async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<LeaveRequest>, sqlx::Error> {
        let rows: Vec<LeaveRequestRow> =
            sqlx::query_as("SELECT * FROM leave_requests ORDER BY start_date, created_at")
                .fetch_all(&mut *conn)
                .await?;
        rows.into_iter().map(LeaveRequest::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;
    use crate::models::LeaveType;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    #[tokio::test]
    async fn test_pending_and_employee_filters() {
        let (pool, _temp) = test_pool().await;
        let dao = LeaveRequestDao::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        let pending = LeaveRequest::new("emp-1", LeaveType::Annual, d(7), d(11)).with_reason("Travel");
        let mut approved = LeaveRequest::new("emp-1", LeaveType::Sick, d(1), d(2));
        approved.status = LeaveStatus::Approved;
        approved.reviewed_by = Some("principal".to_string());
        let other = LeaveRequest::new("emp-2", LeaveType::Unpaid, d(14), d(15));

        for leave in [&pending, &approved, &other] {
            dao.upsert(&mut conn, leave).await.unwrap();
        }

        let pending_list = dao.list_pending().await.unwrap();
        assert_eq!(pending_list.len(), 2);
        assert!(pending_list.iter().all(|l| l.status == LeaveStatus::Pending));

        let emp1 = dao.list_for_employee("emp-1").await.unwrap();
        assert_eq!(emp1, vec![approved, pending]);
    }
}
