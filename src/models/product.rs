use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::collection::{new_id, Collection, Entity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub unit_price: Decimal,
    pub quantity: i64,
    pub reorder_level: i64,
    pub vendor_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, unit_price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            sku: sku.into(),
            name: name.into(),
            category: String::new(),
            unit_price,
            quantity: 0,
            reorder_level: 0,
            vendor_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_stock(mut self, quantity: i64, reorder_level: i64) -> Self {
        self.quantity = quantity;
        self.reorder_level = reorder_level;
        self
    }

    pub fn with_vendor(mut self, vendor_id: impl Into<String>) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }

    pub fn stock_value(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl Entity for Product {
    const COLLECTION: Collection = Collection::Products;

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.name, self.sku)?;
        if !self.category.is_empty() {
            writeln!(f, "Category:      {}", self.category)?;
        }
        writeln!(f, "Unit price:    {}", self.unit_price)?;
        writeln!(f, "In stock:      {}", self.quantity)?;
        writeln!(f, "Reorder level: {}", self.reorder_level)?;
        if self.is_low_stock() {
            writeln!(f, "** Low stock **")?;
        }
        Ok(())
    }
}
