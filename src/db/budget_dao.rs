use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;

use super::{parse_date, parse_decimal, parse_timestamp, LocalDao};
use crate::models::Budget;

pub struct BudgetDao {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct BudgetRow {
    id: String,
    name: String,
    category: String,
    allocated: String,
    period_start: String,
    period_end: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<BudgetRow> for Budget {
    type Error = sqlx::Error;

    fn try_from(row: BudgetRow) -> Result<Self, Self::Error> {
        Ok(Budget {
            id: row.id,
            name: row.name,
            category: row.category,
            allocated: parse_decimal(&row.allocated)?,
            period_start: parse_date(&row.period_start)?,
            period_end: parse_date(&row.period_end)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl BudgetDao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_by_category(&self, category: &str) -> Result<Vec<Budget>, sqlx::Error> {
        let rows: Vec<BudgetRow> = sqlx::query_as(
            "SELECT * FROM budgets WHERE LOWER(category) = LOWER(?) ORDER BY period_start",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Budget::try_from).collect()
    }
}

impl LocalDao<Budget> for BudgetDao {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert(&self, conn: &mut SqliteConnection, budget: &Budget) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO budgets (id, name, category, allocated, period_start, period_end, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&budget.id)
        .bind(&budget.name)
        .bind(&budget.category)
        .bind(budget.allocated.to_string())
        .bind(budget.period_start.to_string())
        .bind(budget.period_end.to_string())
        .bind(budget.created_at.to_rfc3339())
        .bind(budget.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM budgets WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, conn: &mut SqliteConnection, id: &str) -> Result<Option<Budget>, sqlx::Error> {
        let row: Option<BudgetRow> = sqlx::query_as("SELECT * FROM budgets WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Budget::try_from).transpose()
    }

    async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<Budget>, sqlx::Error> {
        let rows: Vec<BudgetRow> = sqlx::query_as("SELECT * FROM budgets ORDER BY category, period_start")
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(Budget::try_from).collect()
    }
}
