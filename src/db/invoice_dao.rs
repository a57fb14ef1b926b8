use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;

use super::{
    parse_date, parse_decimal, parse_json, parse_text, parse_timestamp, to_json, LocalDao,
};
use crate::models::{Invoice, InvoiceStatus};

pub struct InvoiceDao {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: String,
    invoice_number: String,
    customer_id: String,
    customer_name: String,
    items: String,
    tax_rate: String,
    issue_date: String,
    due_date: String,
    status: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = sqlx::Error;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: row.id,
            invoice_number: row.invoice_number,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            items: parse_json(&row.items)?,
            tax_rate: parse_decimal(&row.tax_rate)?,
            issue_date: parse_date(&row.issue_date)?,
            due_date: parse_date(&row.due_date)?,
            status: parse_text(&row.status)?,
            notes: row.notes,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl InvoiceDao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_by_status(&self, status: InvoiceStatus) -> Result<Vec<Invoice>, sqlx::Error> {
        let rows: Vec<InvoiceRow> =
            sqlx::query_as("SELECT * FROM invoices WHERE status = ? ORDER BY due_date, invoice_number")
                .bind(status.to_string())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Invoice::try_from).collect()
    }

    pub async fn get_by_number(&self, invoice_number: &str) -> Result<Option<Invoice>, sqlx::Error> {
        let row: Option<InvoiceRow> =
            sqlx::query_as("SELECT * FROM invoices WHERE LOWER(invoice_number) = LOWER(?)")
                .bind(invoice_number)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Invoice::try_from).transpose()
    }
}

impl LocalDao<Invoice> for InvoiceDao {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert(&self, conn: &mut SqliteConnection, invoice: &Invoice) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO invoices (id, invoice_number, customer_id, customer_name, items, tax_rate, issue_date, due_date, status, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.customer_id)
        .bind(&invoice.customer_name)
        .bind(to_json(&invoice.items)?)
        .bind(invoice.tax_rate.to_string())
        .bind(invoice.issue_date.to_string())
        .bind(invoice.due_date.to_string())
        .bind(invoice.status.to_string())
        .bind(&invoice.notes)
        .bind(invoice.created_at.to_rfc3339())
        .bind(invoice.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM invoices WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, conn: &mut SqliteConnection, id: &str) -> Result<Option<Invoice>, sqlx::Error> {
        let row: Option<InvoiceRow> = sqlx::query_as("SELECT * FROM invoices WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Invoice::try_from).transpose()
    }

    async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<Invoice>, sqlx::Error> {
        let rows: Vec<InvoiceRow> =
            sqlx::query_as("SELECT * FROM invoices ORDER BY issue_date, invoice_number")
                .fetch_all(&mut *conn)
                .await?;
        rows.into_iter().map(Invoice::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;
    use crate::models::InvoiceItem;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn invoice(number: &str, status: InvoiceStatus) -> Invoice {
        let issued = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let due = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        let mut invoice = Invoice::new(number, "cust-1", "Bright Kids Ltd", issued, due)
            .with_items(vec![InvoiceItem::new(
                "Bus service",
                Decimal::from(3),
                Decimal::new(2000, 2),
            )])
            .with_tax_rate(Decimal::new(5, 0))
            .with_notes("Net 30");
        invoice.status = status;
        invoice
    }

    #[tokio::test]
    async fn test_roundtrip_keeps_items() {
        let (pool, _temp) = test_pool().await;
        let dao = InvoiceDao::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        let inv = invoice("INV-100", InvoiceStatus::Draft);
        dao.upsert(&mut conn, &inv).await.unwrap();

        let fetched = dao.find(&mut conn, &inv.id).await.unwrap().unwrap();
        assert_eq!(fetched, inv);
        assert_eq!(fetched.total(), inv.total());
    }

    #[tokio::test]
    async fn test_list_by_status_returns_only_matches() {
        let (pool, _temp) = test_pool().await;
        let dao = InvoiceDao::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        for (number, status) in [
            ("INV-1", InvoiceStatus::Overdue),
            ("INV-2", InvoiceStatus::Paid),
            ("INV-3", InvoiceStatus::Overdue),
            ("INV-4", InvoiceStatus::Sent),
        ] {
            dao.upsert(&mut conn, &invoice(number, status)).await.unwrap();
        }

        let overdue = dao.list_by_status(InvoiceStatus::Overdue).await.unwrap();
        let numbers: Vec<&str> = overdue.iter().map(|i| i.invoice_number.as_str()).collect();
        assert_eq!(numbers, vec!["INV-1", "INV-3"]);
    }

    #[tokio::test]
    async fn test_get_by_number_case_insensitive() {
        let (pool, _temp) = test_pool().await;
        let dao = InvoiceDao::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        dao.upsert(&mut conn, &invoice("INV-ABC", InvoiceStatus::Sent))
            .await
            .unwrap();

        assert!(dao.get_by_number("inv-abc").await.unwrap().is_some());
        assert!(dao.get_by_number("INV-XYZ").await.unwrap().is_none());
    }
}
