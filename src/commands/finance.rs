use chrono::{Days, Local, NaiveDate};
use clap::{Args, Subcommand};
use rust_decimal::Decimal;
use serde_json::json;

use super::{print_json, truncate, CommandResult, OutputFormat};
use school_erp::app::AppContext;
use school_erp::models::{Budget, Invoice, InvoiceItem, InvoiceStatus, Transaction, TransactionKind};

#[derive(Args)]
pub struct FinanceCommand {
    #[command(subcommand)]
    pub command: FinanceSubcommand,
}

#[derive(Subcommand)]
pub enum FinanceSubcommand {
    /// Income and expense transactions
    Tx {
        #[command(subcommand)]
        command: TxSubcommand,
    },

    /// Customer invoices
    Invoice {
        #[command(subcommand)]
        command: InvoiceSubcommand,
    },

    /// Spending budgets
    Budget {
        #[command(subcommand)]
        command: BudgetSubcommand,
    },

    /// Totals, balance and spending per category
    Summary {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Subcommand)]
pub enum TxSubcommand {
    /// Record a transaction
    Add {
        /// income or expense
        kind: TransactionKind,

        amount: Decimal,

        category: String,

        /// Transaction date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        description: Option<String>,
    },

    /// List transactions
    List {
        /// Only income or only expenses
        #[arg(long)]
        kind: Option<TransactionKind>,

        /// First date to include (requires --to)
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,

        /// Last date to include (requires --from)
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a transaction
    Delete {
        /// Transaction ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum InvoiceSubcommand {
    /// Create a draft invoice
    Create {
        /// Invoice number, e.g. INV-2025-001
        number: String,

        /// Customer (usually the paying guardian)
        customer: String,

        /// ID of the customer record, if any
        #[arg(long, default_value = "")]
        customer_id: String,

        /// Line item as DESCRIPTION:QUANTITY:UNIT_PRICE (can be repeated)
        #[arg(long = "item", value_name = "ITEM", value_parser = parse_item, required = true)]
        items: Vec<InvoiceItem>,

        /// Tax rate as a fraction, e.g. 0.075
        #[arg(long)]
        tax_rate: Option<Decimal>,

        /// Issue date (default: today)
        #[arg(long)]
        issue: Option<NaiveDate>,

        /// Due date (default: 30 days after issue)
        #[arg(long)]
        due: Option<NaiveDate>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List invoices
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<InvoiceStatus>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show an invoice's details
    Show {
        /// Invoice ID or number
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a draft invoice as sent
    Send {
        /// Invoice ID or number
        identifier: String,
    },

    /// Record payment and book the income
    Pay {
        /// Invoice ID or number
        identifier: String,

        /// Payment date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Cancel an invoice
    Cancel {
        /// Invoice ID or number
        identifier: String,
    },

    /// Mark sent invoices past their due date as overdue
    Overdue {
        /// Reference date (default: today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
pub enum BudgetSubcommand {
    /// Create a budget for a category and period
    Set {
        name: String,

        /// Expense category the budget covers
        category: String,

        allocated: Decimal,

        /// First day of the period
        #[arg(long)]
        start: NaiveDate,

        /// Last day of the period
        #[arg(long)]
        end: NaiveDate,
    },

    /// List budgets with spending so far
    List {
        /// Filter by category
        #[arg(long)]
        category: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a budget
    Delete {
        /// Budget ID
        id: String,
    },
}

/// Parses DESCRIPTION:QUANTITY:UNIT_PRICE. The description may itself
/// contain colons.
fn parse_item(value: &str) -> Result<InvoiceItem, String> {
    let mut parts = value.rsplitn(3, ':');
    let (Some(price), Some(quantity), Some(description)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!(
            "Invalid item '{}'. Expected DESCRIPTION:QUANTITY:UNIT_PRICE",
            value
        ));
    };
    let quantity: Decimal = quantity
        .trim()
        .parse()
        .map_err(|_| format!("Invalid quantity '{}'", quantity))?;
    let price: Decimal = price
        .trim()
        .parse()
        .map_err(|_| format!("Invalid unit price '{}'", price))?;
    if description.trim().is_empty() {
        return Err("Item description cannot be empty".to_string());
    }
    Ok(InvoiceItem::new(description.trim(), quantity, price))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Looks an invoice up by number first, then by ID.
async fn find_invoice(ctx: &AppContext, identifier: &str) -> Result<Invoice, Box<dyn std::error::Error>> {
    if let Some(invoice) = ctx.invoices.dao().get_by_number(identifier).await? {
        return Ok(invoice);
    }
    match ctx.invoices.get_by_id(identifier).await? {
        Some(invoice) => Ok(invoice),
        None => Err(format!("Invoice not found: {}", identifier).into()),
    }
}

fn print_invoice_table(invoices: &[Invoice]) {
    println!(
        "{:<36}  {:<14}  {:<24}  {:<10}  {:>12}",
        "ID", "NUMBER", "CUSTOMER", "STATUS", "TOTAL"
    );
    println!("{}", "-".repeat(104));
    for invoice in invoices {
        println!(
            "{:<36}  {:<14}  {:<24}  {:<10}  {:>12}",
            invoice.id,
            truncate(&invoice.invoice_number, 14),
            truncate(&invoice.customer_name, 24),
            invoice.status.to_string(),
            invoice.total().to_string()
        );
    }
    println!("\nTotal: {} invoice(s)", invoices.len());
}

impl FinanceCommand {
    /// True for subcommands that change records.
    pub fn writes(&self) -> bool {
        match &self.command {
            FinanceSubcommand::Tx { command } => !matches!(command, TxSubcommand::List { .. }),
            FinanceSubcommand::Invoice { command } => !matches!(
                command,
                InvoiceSubcommand::List { .. } | InvoiceSubcommand::Show { .. }
            ),
            FinanceSubcommand::Budget { command } => !matches!(command, BudgetSubcommand::List { .. }),
            FinanceSubcommand::Summary { .. } => false,
        }
    }

    pub async fn run(&self, ctx: &AppContext) -> CommandResult {
        match &self.command {
            FinanceSubcommand::Tx { command } => run_tx(command, ctx).await,
            FinanceSubcommand::Invoice { command } => run_invoice(command, ctx).await,
            FinanceSubcommand::Budget { command } => run_budget(command, ctx).await,
            FinanceSubcommand::Summary { format } => {
                let vm = ctx.finance();
                vm.ready().await?;

                let by_category = vm.expenses_by_category();
                match format {
                    OutputFormat::Json => print_json(&json!({
                        "income": vm.total_income(),
                        "expenses": vm.total_expenses(),
                        "balance": vm.balance(),
                        "outstanding_invoices": vm.outstanding_total(),
                        "expenses_by_category": by_category,
                    })),
                    OutputFormat::Text => {
                        println!("Income:               {:>12}", vm.total_income().to_string());
                        println!("Expenses:             {:>12}", vm.total_expenses().to_string());
                        println!("Balance:              {:>12}", vm.balance().to_string());
                        println!("Outstanding invoices: {:>12}", vm.outstanding_total().to_string());
                        if !by_category.is_empty() {
                            println!("\nExpenses by category:");
                            for (category, amount) in &by_category {
                                println!("  {:<20} {:>12}", category, amount.to_string());
                            }
                        }
                        Ok(())
                    }
                }
            }
        }
    }
}

async fn run_tx(command: &TxSubcommand, ctx: &AppContext) -> CommandResult {
    match command {
        TxSubcommand::Add {
            kind,
            amount,
            category,
            date,
            description,
        } => {
            let vm = ctx.finance();
            vm.ready().await?;

            let mut tx = Transaction::new(*kind, *amount, category.trim(), date.unwrap_or_else(today));
            if let Some(description) = description {
                tx = tx.with_description(description);
            }
            let created = vm.add_transaction(tx).await?;
            println!("Recorded transaction:");
            println!("{}", created);
            println!("ID: {}", created.id);
            Ok(())
        }

        TxSubcommand::List { kind, from, to, format } => {
            let dao = ctx.transactions.dao();
            let mut transactions = match (from, to, kind) {
                (Some(from), Some(to), _) => dao.list_range(*from, *to).await?,
                (_, _, Some(kind)) => dao.list_by_kind(*kind).await?,
                _ => ctx.transactions.list().await?,
            };
            if let Some(kind) = kind {
                transactions.retain(|t| t.kind == *kind);
            }

            if transactions.is_empty() {
                println!("No transactions found");
                return Ok(());
            }

            match format {
                OutputFormat::Json => print_json(&transactions),
                OutputFormat::Text => {
                    println!(
                        "{:<36}  {:<10}  {:<8}  {:>12}  {:<16}  DESCRIPTION",
                        "ID", "DATE", "KIND", "AMOUNT", "CATEGORY"
                    );
                    println!("{}", "-".repeat(100));
                    for tx in &transactions {
                        println!(
                            "{:<36}  {:<10}  {:<8}  {:>12}  {:<16}  {}",
                            tx.id,
                            tx.date,
                            tx.kind.to_string(),
                            tx.amount.to_string(),
                            truncate(&tx.category, 16),
                            truncate(&tx.description, 30)
                        );
                    }
                    println!("\nTotal: {} transaction(s)", transactions.len());
                    Ok(())
                }
            }
        }

        TxSubcommand::Delete { id } => {
            let vm = ctx.finance();
            vm.ready().await?;
            vm.delete_transaction(id).await?;
            println!("Deleted transaction: {}", id);
            Ok(())
        }
    }
}

async fn run_invoice(command: &InvoiceSubcommand, ctx: &AppContext) -> CommandResult {
    match command {
        InvoiceSubcommand::Create {
            number,
            customer,
            customer_id,
            items,
            tax_rate,
            issue,
            due,
            notes,
        } => {
            let issue = issue.unwrap_or_else(today);
            let due = match due {
                Some(due) => *due,
                None => issue
                    .checked_add_days(Days::new(30))
                    .ok_or("Issue date is out of range")?,
            };

            let mut invoice = Invoice::new(number.trim(), customer_id, customer.trim(), issue, due)
                .with_items(items.clone());
            if let Some(tax_rate) = tax_rate {
                invoice = invoice.with_tax_rate(*tax_rate);
            }
            if let Some(notes) = notes {
                invoice = invoice.with_notes(notes);
            }

            let vm = ctx.finance();
            vm.ready().await?;
            let created = vm.create_invoice(invoice).await?;
            println!("Created invoice:");
            println!("{}", created);
            Ok(())
        }

        InvoiceSubcommand::List { status, format } => {
            let invoices = match status {
                Some(status) => ctx.invoices.dao().list_by_status(*status).await?,
                None => ctx.invoices.list().await?,
            };

            if invoices.is_empty() {
                println!("No invoices found");
                return Ok(());
            }

            match format {
                OutputFormat::Json => print_json(&invoices),
                OutputFormat::Text => {
                    print_invoice_table(&invoices);
                    Ok(())
                }
            }
        }

        InvoiceSubcommand::Show { identifier, format } => {
            let invoice = find_invoice(ctx, identifier).await?;
            match format {
                OutputFormat::Json => print_json(&invoice),
                OutputFormat::Text => {
                    println!("{}", invoice);
                    Ok(())
                }
            }
        }

        InvoiceSubcommand::Send { identifier } => {
            let invoice = find_invoice(ctx, identifier).await?;
            let vm = ctx.finance();
            vm.ready().await?;
            let sent = vm.send_invoice(&invoice.id).await?;
            println!("Invoice {} is now {}", sent.invoice_number, sent.status);
            Ok(())
        }

        InvoiceSubcommand::Pay { identifier, date } => {
            let invoice = find_invoice(ctx, identifier).await?;
            let vm = ctx.finance();
            vm.ready().await?;
            let payment = vm
                .record_payment(&invoice.id, date.unwrap_or_else(today))
                .await?;
            println!(
                "Invoice {} paid; recorded income of {}",
                invoice.invoice_number, payment.amount
            );
            Ok(())
        }

        InvoiceSubcommand::Cancel { identifier } => {
            let invoice = find_invoice(ctx, identifier).await?;
            let vm = ctx.finance();
            vm.ready().await?;
            let cancelled = vm.cancel_invoice(&invoice.id).await?;
            println!("Invoice {} cancelled", cancelled.invoice_number);
            Ok(())
        }

        InvoiceSubcommand::Overdue { today: reference } => {
            let vm = ctx.finance();
            vm.ready().await?;
            let overdue = vm.mark_overdue(reference.unwrap_or_else(today)).await?;
            if overdue.is_empty() {
                println!("No invoices are past due");
            } else {
                println!("Marked {} invoice(s) overdue:\n", overdue.len());
                print_invoice_table(&overdue);
            }
            Ok(())
        }
    }
}

async fn run_budget(command: &BudgetSubcommand, ctx: &AppContext) -> CommandResult {
    match command {
        BudgetSubcommand::Set {
            name,
            category,
            allocated,
            start,
            end,
        } => {
            let vm = ctx.finance();
            vm.ready().await?;
            let budget = vm
                .set_budget(Budget::new(name.trim(), category.trim(), *allocated, *start, *end))
                .await?;
            println!(
                "Budget '{}' set: {} for {} ({} to {})",
                budget.name, budget.allocated, budget.category, budget.period_start, budget.period_end
            );
            println!("ID: {}", budget.id);
            Ok(())
        }

        BudgetSubcommand::List { category, format } => {
            let vm = ctx.finance();
            vm.ready().await?;

            let mut summaries = vm.budget_summaries();
            if let Some(category) = category {
                let ids: Vec<String> = ctx
                    .budgets
                    .dao()
                    .list_by_category(category)
                    .await?
                    .into_iter()
                    .map(|b| b.id)
                    .collect();
                summaries.retain(|s| ids.contains(&s.budget.id));
            }

            if summaries.is_empty() {
                println!("No budgets found");
                return Ok(());
            }

            match format {
                OutputFormat::Json => print_json(&summaries),
                OutputFormat::Text => {
                    println!(
                        "{:<36}  {:<20}  {:<14}  {:>12}  {:>12}  {:>7}",
                        "ID", "NAME", "CATEGORY", "ALLOCATED", "SPENT", "USED %"
                    );
                    println!("{}", "-".repeat(110));
                    for summary in &summaries {
                        let flag = if summary.over_budget { "  OVER" } else { "" };
                        println!(
                            "{:<36}  {:<20}  {:<14}  {:>12}  {:>12}  {:>7}{}",
                            summary.budget.id,
                            truncate(&summary.budget.name, 20),
                            truncate(&summary.budget.category, 14),
                            summary.budget.allocated.to_string(),
                            summary.spent.to_string(),
                            summary.utilization.to_string(),
                            flag
                        );
                    }
                    println!("\nTotal: {} budget(s)", summaries.len());
                    Ok(())
                }
            }
        }

        BudgetSubcommand::Delete { id } => {
            let vm = ctx.finance();
            vm.ready().await?;
            vm.delete_budget(id).await?;
            println!("Deleted budget: {}", id);
            Ok(())
        }
    }
}
