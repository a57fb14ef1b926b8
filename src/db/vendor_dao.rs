use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;

use super::{parse_timestamp, LocalDao};
use crate::models::Vendor;

pub struct VendorDao {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct VendorRow {
    id: String,
    name: String,
    contact_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<VendorRow> for Vendor {
    type Error = sqlx::Error;

    fn try_from(row: VendorRow) -> Result<Self, Self::Error> {
        Ok(Vendor {
            id: row.id,
            name: row.name,
            contact_name: row.contact_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            active: row.active,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl VendorDao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_active(&self) -> Result<Vec<Vendor>, sqlx::Error> {
        let rows: Vec<VendorRow> =
            sqlx::query_as("SELECT * FROM vendors WHERE active = 1 ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Vendor::try_from).collect()
    }
}

impl LocalDao<Vendor> for VendorDao {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert(&self, conn: &mut SqliteConnection, vendor: &Vendor) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO vendors (id, name, contact_name, email, phone, address, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&vendor.id)
        .bind(&vendor.name)
        .bind(&vendor.contact_name)
        .bind(&vendor.email)
        .bind(&vendor.phone)
        .bind(&vendor.address)
        .bind(vendor.active)
        .bind(vendor.created_at.to_rfc3339())
        .bind(vendor.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM vendors WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, conn: &mut SqliteConnection, id: &str) -> Result<Option<Vendor>, sqlx::Error> {
        let row: Option<VendorRow> = sqlx::query_as("SELECT * FROM vendors WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Vendor::try_from).transpose()
    }

    async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<Vendor>, sqlx::Error> {
        let rows: Vec<VendorRow> = sqlx::query_as("SELECT * FROM vendors ORDER BY name")
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(Vendor::try_from).collect()
    }
}
