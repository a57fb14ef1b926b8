use clap::{Args, Subcommand};
use rust_decimal::Decimal;

use super::{print_json, truncate, CommandResult, OutputFormat};
use school_erp::app::AppContext;
use school_erp::models::{Product, Vendor};

#[derive(Args)]
pub struct InventoryCommand {
    #[command(subcommand)]
    pub command: InventorySubcommand,
}

#[derive(Subcommand)]
pub enum InventorySubcommand {
    /// Stocked items
    Product {
        #[command(subcommand)]
        command: ProductSubcommand,
    },

    /// Suppliers
    Vendor {
        #[command(subcommand)]
        command: VendorSubcommand,
    },
}

#[derive(Subcommand)]
pub enum ProductSubcommand {
    /// Add a product
    Add {
        /// Stock keeping unit, unique per product
        sku: String,

        name: String,

        unit_price: Decimal,

        #[arg(long, default_value = "")]
        category: String,

        /// Quantity on hand
        #[arg(long, default_value_t = 0)]
        quantity: i64,

        /// Restock when quantity falls to this level
        #[arg(long, default_value_t = 0)]
        reorder_level: i64,

        /// Supplying vendor ID
        #[arg(long)]
        vendor: Option<String>,
    },

    /// List products
    List {
        /// Only products at or below their reorder level
        #[arg(long)]
        low_stock: bool,

        /// Filter by vendor ID
        #[arg(long, conflicts_with = "low_stock")]
        vendor: Option<String>,

        /// Name or SKU contains this text
        #[arg(long, conflicts_with_all = ["low_stock", "vendor"])]
        search: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change the quantity on hand
    Adjust {
        /// Product SKU or ID
        identifier: String,

        /// Amount to add; negative to remove
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },

    /// Delete a product
    Delete {
        /// Product SKU or ID
        identifier: String,
    },
}

#[derive(Subcommand)]
pub enum VendorSubcommand {
    /// Add a vendor
    Add {
        name: String,

        /// Contact person
        #[arg(long)]
        contact: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        #[arg(long)]
        address: Option<String>,
    },

    /// List vendors
    List {
        /// Only active vendors
        #[arg(long)]
        active: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Stop ordering from a vendor
    Deactivate {
        /// Vendor ID
        id: String,
    },

    /// Delete a vendor
    Delete {
        /// Vendor ID
        id: String,
    },
}

/// Looks a product up by SKU first, then by ID.
async fn find_product(ctx: &AppContext, identifier: &str) -> Result<Product, Box<dyn std::error::Error>> {
    if let Some(product) = ctx.products.dao().get_by_sku(identifier).await? {
        return Ok(product);
    }
    match ctx.products.get_by_id(identifier).await? {
        Some(product) => Ok(product),
        None => Err(format!("Product not found: {}", identifier).into()),
    }
}

impl InventoryCommand {
    /// True for subcommands that change records.
    pub fn writes(&self) -> bool {
        match &self.command {
            InventorySubcommand::Product { command } => !matches!(command, ProductSubcommand::List { .. }),
            InventorySubcommand::Vendor { command } => !matches!(command, VendorSubcommand::List { .. }),
        }
    }

    pub async fn run(&self, ctx: &AppContext) -> CommandResult {
        let vm = ctx.inventory();
        vm.ready().await?;

        match &self.command {
            InventorySubcommand::Product { command } => match command {
                ProductSubcommand::Add {
                    sku,
                    name,
                    unit_price,
                    category,
                    quantity,
                    reorder_level,
                    vendor,
                } => {
                    let mut product = Product::new(sku.trim(), name.trim(), *unit_price)
                        .with_category(category.trim())
                        .with_stock(*quantity, *reorder_level);
                    if let Some(vendor) = vendor {
                        if vm.vendor_name(vendor).is_none() {
                            tracing::warn!(vendor = %vendor, "product refers to an unknown vendor");
                        }
                        product = product.with_vendor(vendor);
                    }
                    let created = vm.add_product(product).await?;
                    println!("Added product:");
                    println!("{}", created);
                    println!("ID: {}", created.id);
                    Ok(())
                }

                ProductSubcommand::List {
                    low_stock,
                    vendor,
                    search,
                    format,
                } => {
                    let dao = ctx.products.dao();
                    let products = if *low_stock {
                        dao.list_low_stock().await?
                    } else if let Some(vendor) = vendor {
                        dao.list_by_vendor(vendor).await?
                    } else if let Some(query) = search {
                        vm.search_products(query)
                    } else {
                        ctx.products.list().await?
                    };

                    if products.is_empty() {
                        println!("No products found");
                        return Ok(());
                    }

                    match format {
                        OutputFormat::Json => print_json(&products),
                        OutputFormat::Text => {
                            println!(
                                "{:<36}  {:<10}  {:<24}  {:>10}  {:>6}  {:>7}  VENDOR",
                                "ID", "SKU", "NAME", "PRICE", "QTY", "REORDER"
                            );
                            println!("{}", "-".repeat(118));
                            for product in &products {
                                let vendor = product
                                    .vendor_id
                                    .as_deref()
                                    .map(|id| vm.vendor_name(id).unwrap_or_else(|| id.to_string()))
                                    .unwrap_or_default();
                                let marker = if product.is_low_stock() { "!" } else { " " };
                                println!(
                                    "{:<36}  {:<10}  {:<24}  {:>10}  {:>5}{}  {:>7}  {}",
                                    product.id,
                                    truncate(&product.sku, 10),
                                    truncate(&product.name, 24),
                                    product.unit_price.to_string(),
                                    product.quantity,
                                    marker,
                                    product.reorder_level,
                                    truncate(&vendor, 20)
                                );
                            }
                            println!("\nTotal: {} product(s)", products.len());
                            println!("Stock value: {}", vm.total_stock_value());
                            Ok(())
                        }
                    }
                }

                ProductSubcommand::Adjust { identifier, delta } => {
                    let product = find_product(ctx, identifier).await?;
                    let updated = vm.adjust_stock(&product.id, *delta).await?;
                    println!(
                        "{}: {} -> {}",
                        updated.name, product.quantity, updated.quantity
                    );
                    if updated.is_low_stock() {
                        println!("Stock is at or below the reorder level ({})", updated.reorder_level);
                    }
                    Ok(())
                }

                ProductSubcommand::Delete { identifier } => {
                    let product = find_product(ctx, identifier).await?;
                    vm.delete_product(&product.id).await?;
                    println!("Deleted product: {}", product.name);
                    Ok(())
                }
            },

            InventorySubcommand::Vendor { command } => match command {
                VendorSubcommand::Add {
                    name,
                    contact,
                    email,
                    phone,
                    address,
                } => {
                    let mut vendor = Vendor::new(name.trim());
                    if let Some(contact) = contact {
                        vendor = vendor.with_contact(contact);
                    }
                    if let Some(email) = email {
                        vendor = vendor.with_email(email);
                    }
                    if let Some(phone) = phone {
                        vendor = vendor.with_phone(phone);
                    }
                    if let Some(address) = address {
                        vendor = vendor.with_address(address);
                    }
                    let created = vm.add_vendor(vendor).await?;
                    println!("Added vendor: {} ({})", created.name, created.id);
                    Ok(())
                }

                VendorSubcommand::List { active, format } => {
                    let vendors = if *active {
                        ctx.vendors.dao().list_active().await?
                    } else {
                        ctx.vendors.list().await?
                    };

                    if vendors.is_empty() {
                        println!("No vendors found");
                        return Ok(());
                    }

                    match format {
                        OutputFormat::Json => print_json(&vendors),
                        OutputFormat::Text => {
                            println!(
                                "{:<36}  {:<24}  {:<20}  {:<16}  ACTIVE",
                                "ID", "NAME", "CONTACT", "PHONE"
                            );
                            println!("{}", "-".repeat(108));
                            for vendor in &vendors {
                                println!(
                                    "{:<36}  {:<24}  {:<20}  {:<16}  {}",
                                    vendor.id,
                                    truncate(&vendor.name, 24),
                                    truncate(vendor.contact_name.as_deref().unwrap_or(""), 20),
                                    truncate(vendor.phone.as_deref().unwrap_or(""), 16),
                                    if vendor.active { "yes" } else { "no" }
                                );
                            }
                            println!("\nTotal: {} vendor(s)", vendors.len());
                            Ok(())
                        }
                    }
                }

                VendorSubcommand::Deactivate { id } => {
                    let vendor = vm.deactivate_vendor(id).await?;
                    println!("Deactivated vendor: {}", vendor.name);
                    Ok(())
                }

                VendorSubcommand::Delete { id } => {
                    let name = vm.vendor_name(id);
                    vm.delete_vendor(id).await?;
                    println!("Deleted vendor: {}", name.as_deref().unwrap_or(id));
                    Ok(())
                }
            },
        }
    }
}
