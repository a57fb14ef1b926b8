use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

use super::{matches_query, not_found, validation, CollectionState, Result};
use crate::app::{ProductRepository, VendorRepository};
use crate::models::{Product, Vendor};

pub struct InventoryViewModel {
    product_repo: Arc<ProductRepository>,
    vendor_repo: Arc<VendorRepository>,
    pub products: CollectionState<Product>,
    pub vendors: CollectionState<Vendor>,
}

impl InventoryViewModel {
    pub fn new(product_repo: Arc<ProductRepository>, vendor_repo: Arc<VendorRepository>) -> Self {
        Self {
            products: CollectionState::bind(product_repo.clone()),
            vendors: CollectionState::bind(vendor_repo.clone()),
            product_repo,
            vendor_repo,
        }
    }

    pub async fn ready(&self) -> Result<()> {
        self.products.loaded().await?;
        self.vendors.loaded().await?;
        Ok(())
    }

    pub async fn add_product(&self, product: Product) -> Result<Product> {
        if product.sku.trim().is_empty() || product.name.trim().is_empty() {
            return Err(validation("Product SKU and name are required"));
        }
        if product.unit_price < Decimal::ZERO {
            return Err(validation("Unit price cannot be negative"));
        }
        if product.quantity < 0 || product.reorder_level < 0 {
            return Err(validation("Stock levels cannot be negative"));
        }
        if self
            .products
            .items()
            .iter()
            .any(|p| p.id != product.id && p.sku.eq_ignore_ascii_case(&product.sku))
        {
            return Err(validation(format!("SKU '{}' is already used", product.sku)));
        }
        self.product_repo.save(&product).await?;
        Ok(product)
    }

    pub async fn delete_product(&self, id: &str) -> Result<()> {
        if !self.product_repo.delete(id).await? {
            return Err(not_found("Product", id));
        }
        Ok(())
    }

    /// Products at or below their reorder level.
    pub fn low_stock_products(&self) -> Vec<Product> {
        self.products
            .items()
            .into_iter()
            .filter(Product::is_low_stock)
            .collect()
    }

    pub fn products_by_vendor(&self, vendor_id: &str) -> Vec<Product> {
        self.products
            .items()
            .into_iter()
            .filter(|p| p.vendor_id.as_deref() == Some(vendor_id))
            .collect()
    }

    /// Name or SKU contains `query`, ignoring case. Sorted by name.
    pub fn search_products(&self, query: &str) -> Vec<Product> {
        let mut found: Vec<Product> = self
            .products
            .items()
            .into_iter()
            .filter(|p| matches_query(&p.name, query) || matches_query(&p.sku, query))
            .collect();
        found.sort_by_key(|p| p.name.to_lowercase());
        found
    }

    pub fn total_stock_value(&self) -> Decimal {
        self.products.items().iter().map(Product::stock_value).sum()
    }

    /// Adds `delta` (negative to remove) to the quantity on hand.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> Result<Product> {
        let mut product = self
            .product_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("Product", id))?;
        let quantity = product.quantity.checked_add(delta).filter(|q| *q >= 0).ok_or_else(|| {
            validation(format!(
                "Cannot adjust {} by {}: only {} in stock",
                product.name, delta, product.quantity
            ))
        })?;
        product.quantity = quantity;
        product.updated_at = Utc::now();
        self.product_repo.save(&product).await?;
        if product.is_low_stock() {
            tracing::info!(sku = %product.sku, quantity, "product at or below reorder level");
        }
        Ok(product)
    }

    pub async fn add_vendor(&self, vendor: Vendor) -> Result<Vendor> {
        if vendor.name.trim().is_empty() {
            return Err(validation("Vendor name is required"));
        }
        self.vendor_repo.save(&vendor).await?;
        Ok(vendor)
    }

    pub async fn deactivate_vendor(&self, id: &str) -> Result<Vendor> {
        let mut vendor = self
            .vendor_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("Vendor", id))?;
        vendor.active = false;
        vendor.updated_at = Utc::now();
        self.vendor_repo.save(&vendor).await?;
        Ok(vendor)
    }

    /// Products keep their vendor id after the vendor is gone.
    pub async fn delete_vendor(&self, id: &str) -> Result<()> {
        if !self.vendor_repo.delete(id).await? {
            return Err(not_found("Vendor", id));
        }
        Ok(())
    }

    pub fn active_vendors(&self) -> Vec<Vendor> {
        self.vendors.items().into_iter().filter(|v| v.active).collect()
    }

    pub fn vendor_name(&self, id: &str) -> Option<String> {
        self.vendors.find(id).map(|v| v.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::test_context;
    use crate::viewmodel::ViewModelError;

    #[tokio::test]
    async fn test_stock_queries() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.inventory();
        vm.ready().await.unwrap();

        let vendor = vm.add_vendor(Vendor::new("Acme Stationers")).await.unwrap();
        let chalk = vm
            .add_product(
                Product::new("CH-01", "White Chalk", Decimal::new(250, 2))
                    .with_stock(4, 10)
                    .with_vendor(&vendor.id),
            )
            .await
            .unwrap();
        let markers = vm
            .add_product(Product::new("MK-01", "Markers", Decimal::from(3)).with_stock(20, 5))
            .await
            .unwrap();

        assert_eq!(vm.low_stock_products(), vec![chalk.clone()]);
        assert_eq!(vm.products_by_vendor(&vendor.id), vec![chalk.clone()]);
        // 4 * 2.50 + 20 * 3
        assert_eq!(vm.total_stock_value(), Decimal::from(70));

        let found: Vec<String> = vm.search_products("ch").into_iter().map(|p| p.name).collect();
        assert_eq!(found, vec!["White Chalk"]);
        let by_sku: Vec<String> = vm.search_products("-01").into_iter().map(|p| p.name).collect();
        assert_eq!(by_sku, vec!["Markers", "White Chalk"]);

        vm.delete_product(&markers.id).await.unwrap();
        assert_eq!(vm.products.items().len(), 1);
    }

    #[tokio::test]
    async fn test_adjust_stock_never_goes_negative() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.inventory();
        vm.ready().await.unwrap();

        let paper = vm
            .add_product(Product::new("PA-1", "Paper", Decimal::from(5)).with_stock(10, 2))
            .await
            .unwrap();

        let after = vm.adjust_stock(&paper.id, -7).await.unwrap();
        assert_eq!(after.quantity, 3);

        let err = vm.adjust_stock(&paper.id, -4).await.unwrap_err();
        assert!(matches!(err, ViewModelError::Validation(_)));
        assert_eq!(vm.products.find(&paper.id).unwrap().quantity, 3);

        assert_eq!(vm.adjust_stock(&paper.id, 12).await.unwrap().quantity, 15);
        assert!(matches!(
            vm.adjust_stock("missing", 1).await,
            Err(ViewModelError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.inventory();
        vm.ready().await.unwrap();

        vm.add_product(Product::new("PA-1", "Paper", Decimal::ONE)).await.unwrap();
        let err = vm
            .add_product(Product::new("pa-1", "Other paper", Decimal::ONE))
            .await
            .unwrap_err();
        assert!(matches!(err, ViewModelError::Validation(_)));
    }

    #[tokio::test]
    async fn test_vendor_lifecycle() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.inventory();
        vm.ready().await.unwrap();

        let vendor = vm.add_vendor(Vendor::new("Best Printers")).await.unwrap();
        assert_eq!(vm.vendor_name(&vendor.id).as_deref(), Some("Best Printers"));
        assert_eq!(vm.active_vendors().len(), 1);

        vm.deactivate_vendor(&vendor.id).await.unwrap();
        assert!(vm.active_vendors().is_empty());

        vm.delete_vendor(&vendor.id).await.unwrap();
        assert_eq!(vm.vendor_name(&vendor.id), None);
        assert!(vm.delete_vendor(&vendor.id).await.is_err());
    }
}
