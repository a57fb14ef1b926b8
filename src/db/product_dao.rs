use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;

use super::{parse_decimal, parse_timestamp, LocalDao};
use crate::models::Product;

pub struct ProductDao {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    name: String,
    category: String,
    unit_price: String,
    quantity: i64,
    reorder_level: i64,
    vendor_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = sqlx::Error;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            category: row.category,
            unit_price: parse_decimal(&row.unit_price)?,
            quantity: row.quantity,
            reorder_level: row.reorder_level,
            vendor_id: row.vendor_id,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl ProductDao {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Products at or below their reorder level.
    pub async fn list_low_stock(&self) -> Result<Vec<Product>, sqlx::Error> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            "SELECT * FROM products WHERE quantity <= reorder_level ORDER BY quantity, name",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    pub async fn list_by_vendor(&self, vendor_id: &str) -> Result<Vec<Product>, sqlx::Error> {
        let rows: Vec<ProductRow> =
            sqlx::query_as("SELECT * FROM products WHERE vendor_id = ? ORDER BY name")
                .bind(vendor_id)
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    pub async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>, sqlx::Error> {
        let row: Option<ProductRow> =
            sqlx::query_as("SELECT * FROM products WHERE LOWER(sku) = LOWER(?)")
                .bind(sku)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Product::try_from).transpose()
    }
}

impl LocalDao<Product> for ProductDao {
    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert(&self, conn: &mut SqliteConnection, product: &Product) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO products (id, sku, name, category, unit_price, quantity, reorder_level, vendor_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.unit_price.to_string())
        .bind(product.quantity)
        .bind(product.reorder_level)
        .bind(&product.vendor_id)
        .bind(product.created_at.to_rfc3339())
        .bind(product.updated_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn remove(&self, conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, conn: &mut SqliteConnection, id: &str) -> Result<Option<Product>, sqlx::Error> {
        let row: Option<ProductRow> = sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(Product::try_from).transpose()
    }

    async fn list(&self, conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
        let rows: Vec<ProductRow> = sqlx::query_as("SELECT * FROM products ORDER BY name")
            .fetch_all(&mut *conn)
            .await?;
        rows.into_iter().map(Product::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::test_pool;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_low_stock_and_vendor_queries() {
        let (pool, _temp) = test_pool().await;
        let dao = ProductDao::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        let chalk = Product::new("CH-1", "Chalk", Decimal::new(150, 2))
            .with_stock(4, 10)
            .with_vendor("v-1");
        let paper = Product::new("PA-1", "Paper", Decimal::new(500, 2))
            .with_stock(200, 50)
            .with_vendor("v-1");
        let ink = Product::new("IN-1", "Ink", Decimal::from(12)).with_stock(5, 5);
        for product in [&chalk, &paper, &ink] {
            dao.upsert(&mut conn, product).await.unwrap();
        }

        let low: Vec<String> = dao
            .list_low_stock()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(low, vec!["Chalk", "Ink"]);

        let from_vendor = dao.list_by_vendor("v-1").await.unwrap();
        assert_eq!(from_vendor, vec![chalk, paper]);

        assert_eq!(dao.get_by_sku("in-1").await.unwrap(), Some(ink));
    }
}
