use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ensure_transition, not_found, validation, CollectionState, Result, UiState};
use crate::app::{BudgetRepository, InvoiceRepository, TransactionRepository};
use crate::models::{Budget, Invoice, InvoiceStatus, Transaction, TransactionKind};
use crate::repository::RepositoryError;

/// Category used for income recorded against a paid invoice.
pub const INVOICE_PAYMENT_CATEGORY: &str = "invoice";

/// Spending against one budget over its period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub budget: Budget,
    pub spent: Decimal,
    pub remaining: Decimal,
    /// Percent of the allocation spent; 0 when nothing was allocated.
    pub utilization: Decimal,
    pub over_budget: bool,
}

pub struct FinanceViewModel {
    transaction_repo: Arc<TransactionRepository>,
    invoice_repo: Arc<InvoiceRepository>,
    budget_repo: Arc<BudgetRepository>,
    pub transactions: CollectionState<Transaction>,
    pub invoices: CollectionState<Invoice>,
    pub budgets: CollectionState<Budget>,
}

impl FinanceViewModel {
    pub fn new(
        transaction_repo: Arc<TransactionRepository>,
        invoice_repo: Arc<InvoiceRepository>,
        budget_repo: Arc<BudgetRepository>,
    ) -> Self {
        Self {
            transactions: CollectionState::bind(transaction_repo.clone()),
            invoices: CollectionState::bind(invoice_repo.clone()),
            budgets: CollectionState::bind(budget_repo.clone()),
            transaction_repo,
            invoice_repo,
            budget_repo,
        }
    }

    /// Waits until every collection has loaded. A failed load is an error.
    pub async fn ready(&self) -> Result<()> {
        self.transactions.loaded().await?;
        self.invoices.loaded().await?;
        self.budgets.loaded().await?;
        Ok(())
    }

    pub fn transactions_state(&self) -> UiState<Transaction> {
        self.transactions.state()
    }

    pub fn total_income(&self) -> Decimal {
        sum_kind(&self.transactions.items(), TransactionKind::Income)
    }

    pub fn total_expenses(&self) -> Decimal {
        sum_kind(&self.transactions.items(), TransactionKind::Expense)
    }

    pub fn balance(&self) -> Decimal {
        self.transactions
            .items()
            .iter()
            .map(Transaction::signed_amount)
            .sum()
    }

    pub fn expenses_by_category(&self) -> BTreeMap<String, Decimal> {
        let mut totals = BTreeMap::new();
        for tx in self.transactions.items() {
            if tx.kind == TransactionKind::Expense {
                *totals.entry(tx.category).or_insert(Decimal::ZERO) += tx.amount;
            }
        }
        totals
    }

    pub fn budget_summaries(&self) -> Vec<BudgetSummary> {
        let transactions = self.transactions.items();
        self.budgets
            .items()
            .into_iter()
            .map(|budget| summarize_budget(budget, &transactions))
            .collect()
    }

    pub fn invoices_by_status(&self, status: InvoiceStatus) -> Vec<Invoice> {
        self.invoices
            .items()
            .into_iter()
            .filter(|invoice| invoice.status == status)
            .collect()
    }

    /// Total of sent and overdue invoices.
    pub fn outstanding_total(&self) -> Decimal {
        self.invoices
            .items()
            .iter()
            .filter(|invoice| invoice.status.is_outstanding())
            .map(Invoice::total)
            .sum()
    }

    pub async fn add_transaction(&self, transaction: Transaction) -> Result<Transaction> {
        if transaction.amount <= Decimal::ZERO {
            return Err(validation("Amount must be greater than zero"));
        }
        if transaction.category.trim().is_empty() {
            return Err(validation("Category is required"));
        }
        self.transaction_repo.save(&transaction).await?;
        Ok(transaction)
    }

    pub async fn delete_transaction(&self, id: &str) -> Result<()> {
        if !self.transaction_repo.delete(id).await? {
            return Err(not_found("Transaction", id));
        }
        Ok(())
    }

    /// Saves a new invoice as a draft.
    pub async fn create_invoice(&self, mut invoice: Invoice) -> Result<Invoice> {
        if invoice.items.is_empty() {
            return Err(validation("Invoice needs at least one item"));
        }
        if invoice.due_date < invoice.issue_date {
            return Err(validation("Due date cannot be before the issue date"));
        }
        if self
            .invoices
            .items()
            .iter()
            .any(|other| other.invoice_number.eq_ignore_ascii_case(&invoice.invoice_number))
        {
            return Err(validation(format!(
                "Invoice number '{}' is already used",
                invoice.invoice_number
            )));
        }
        invoice.status = InvoiceStatus::Draft;
        self.invoice_repo.save(&invoice).await?;
        Ok(invoice)
    }

    pub async fn send_invoice(&self, id: &str) -> Result<Invoice> {
        self.move_invoice(id, InvoiceStatus::Sent).await
    }

    pub async fn cancel_invoice(&self, id: &str) -> Result<Invoice> {
        self.move_invoice(id, InvoiceStatus::Cancelled).await
    }

    /// Moves sent invoices due before `today` to overdue.
    pub async fn mark_overdue(&self, today: NaiveDate) -> Result<Vec<Invoice>> {
        let mut marked = Vec::new();
        for invoice in self.invoices.items() {
            if invoice.status == InvoiceStatus::Sent && invoice.due_date < today {
                marked.push(self.move_invoice(&invoice.id, InvoiceStatus::Overdue).await?);
            }
        }
        Ok(marked)
    }

    /// Marks the invoice paid and books its total as income. Both writes
    /// commit together or not at all.
    pub async fn record_payment(&self, invoice_id: &str, date: NaiveDate) -> Result<Transaction> {
        let invoice = self.transitioned(invoice_id, InvoiceStatus::Paid).await?;
        let payment = Transaction::income(invoice.total(), INVOICE_PAYMENT_CATEGORY, date)
            .with_description(format!(
                "Payment for {} ({})",
                invoice.invoice_number, invoice.customer_name
            ))
            .with_reference(&invoice.id);

        let mut tx = self.invoice_repo.begin().await?;
        self.invoice_repo.save_in(&mut tx, &invoice).await?;
        self.transaction_repo.save_in(&mut tx, &payment).await?;
        tx.commit().await.map_err(RepositoryError::from)?;
        self.invoice_repo.publish().await?;
        self.transaction_repo.publish().await?;

        tracing::info!(invoice = %invoice.invoice_number, amount = %payment.amount, "payment recorded");
        Ok(payment)
    }

    pub async fn set_budget(&self, budget: Budget) -> Result<Budget> {
        if budget.allocated < Decimal::ZERO {
            return Err(validation("Allocated amount cannot be negative"));
        }
        if budget.period_end < budget.period_start {
            return Err(validation("Budget period ends before it starts"));
        }
        self.budget_repo.save(&budget).await?;
        Ok(budget)
    }

    pub async fn delete_budget(&self, id: &str) -> Result<()> {
        if !self.budget_repo.delete(id).await? {
            return Err(not_found("Budget", id));
        }
        Ok(())
    }

    async fn move_invoice(&self, id: &str, next: InvoiceStatus) -> Result<Invoice> {
        let invoice = self.transitioned(id, next).await?;
        self.invoice_repo.save(&invoice).await?;
        Ok(invoice)
    }

    /// The invoice moved to `next`, not yet saved.
    async fn transitioned(&self, id: &str, next: InvoiceStatus) -> Result<Invoice> {
        let mut invoice = self
            .invoice_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("Invoice", id))?;
        ensure_transition(invoice.status, next)?;
        invoice.status = next;
        invoice.updated_at = Utc::now();
        Ok(invoice)
    }
}

fn sum_kind(transactions: &[Transaction], kind: TransactionKind) -> Decimal {
    transactions
        .iter()
        .filter(|tx| tx.kind == kind)
        .map(|tx| tx.amount)
        .sum()
}

fn summarize_budget(budget: Budget, transactions: &[Transaction]) -> BudgetSummary {
    let spent: Decimal = transactions
        .iter()
        .filter(|tx| {
            tx.kind == TransactionKind::Expense
                && tx.category.eq_ignore_ascii_case(&budget.category)
                && budget.covers(tx.date)
        })
        .map(|tx| tx.amount)
        .sum();
    let utilization = if budget.allocated.is_zero() {
        Decimal::ZERO
    } else {
        (spent / budget.allocated * Decimal::ONE_HUNDRED).round_dp(2)
    };
    BudgetSummary {
        remaining: budget.allocated - spent,
        over_budget: spent > budget.allocated,
        spent,
        utilization,
        budget,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::test_context;
    use crate::models::InvoiceItem;
    use crate::viewmodel::ViewModelError;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn draft_invoice(number: &str) -> Invoice {
        Invoice::new(number, "parent-1", "Mr Okoro", day(1), day(15)).with_items(vec![
            InvoiceItem::new("Tuition", Decimal::ONE, Decimal::from(300)),
            InvoiceItem::new("Books", Decimal::from(2), Decimal::from(25)),
        ])
    }

    #[tokio::test]
    async fn test_balance_is_income_minus_expenses() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.finance();
        vm.ready().await.unwrap();
        assert_eq!(vm.balance(), Decimal::ZERO);

        vm.add_transaction(Transaction::income(Decimal::from(100), "fees", day(1)))
            .await
            .unwrap();
        vm.add_transaction(Transaction::expense(Decimal::from(50), "supplies", day(2)))
            .await
            .unwrap();
        vm.add_transaction(Transaction::expense(Decimal::from(30), "repairs", day(3)))
            .await
            .unwrap();

        assert_eq!(vm.total_income(), Decimal::from(100));
        assert_eq!(vm.total_expenses(), Decimal::from(80));
        assert_eq!(vm.balance(), Decimal::from(20));

        let by_category = vm.expenses_by_category();
        assert_eq!(by_category.get("supplies"), Some(&Decimal::from(50)));
        assert_eq!(by_category.get("repairs"), Some(&Decimal::from(30)));
        assert_eq!(by_category.get("fees"), None);
    }

    #[tokio::test]
    async fn test_add_transaction_rejects_non_positive_amount() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.finance();
        vm.ready().await.unwrap();

        let err = vm
            .add_transaction(Transaction::expense(Decimal::ZERO, "supplies", day(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ViewModelError::Validation(_)));
        assert!(vm.transactions.items().is_empty());
    }

    #[tokio::test]
    async fn test_delete_transaction() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.finance();
        vm.ready().await.unwrap();

        let tx = vm
            .add_transaction(Transaction::income(Decimal::from(5), "fees", day(1)))
            .await
            .unwrap();
        vm.delete_transaction(&tx.id).await.unwrap();
        assert!(vm.transactions.items().iter().all(|t| t.id != tx.id));
        assert!(matches!(
            vm.delete_transaction(&tx.id).await,
            Err(ViewModelError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invoice_lifecycle_and_payment() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.finance();
        vm.ready().await.unwrap();

        let invoice = vm.create_invoice(draft_invoice("INV-001")).await.unwrap();
        assert_eq!(vm.outstanding_total(), Decimal::ZERO);

        // Draft cannot be paid directly
        let err = vm.record_payment(&invoice.id, day(10)).await.unwrap_err();
        assert!(matches!(err, ViewModelError::InvalidTransition { .. }));
        assert!(vm.transactions.items().is_empty());

        vm.send_invoice(&invoice.id).await.unwrap();
        assert_eq!(vm.outstanding_total(), Decimal::from(350));

        let payment = vm.record_payment(&invoice.id, day(10)).await.unwrap();
        assert_eq!(payment.amount, Decimal::from(350));
        assert_eq!(payment.category, INVOICE_PAYMENT_CATEGORY);
        assert_eq!(payment.reference_id.as_deref(), Some(invoice.id.as_str()));
        assert_eq!(vm.invoices_by_status(InvoiceStatus::Paid).len(), 1);
        assert_eq!(vm.outstanding_total(), Decimal::ZERO);
        assert_eq!(vm.balance(), Decimal::from(350));

        assert!(vm.cancel_invoice(&invoice.id).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_payment_leaves_invoice_payable() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.finance();
        vm.ready().await.unwrap();

        let invoice = vm.create_invoice(draft_invoice("INV-009")).await.unwrap();
        vm.send_invoice(&invoice.id).await.unwrap();

        sqlx::query("ALTER TABLE transactions RENAME TO transactions_offline")
            .execute(&ctx.pool)
            .await
            .unwrap();
        assert!(vm.record_payment(&invoice.id, day(10)).await.is_err());
        let stored = ctx.invoices.require(&invoice.id).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Sent);

        sqlx::query("ALTER TABLE transactions_offline RENAME TO transactions")
            .execute(&ctx.pool)
            .await
            .unwrap();
        let payment = vm.record_payment(&invoice.id, day(11)).await.unwrap();
        assert_eq!(payment.amount, Decimal::from(350));
        assert_eq!(
            ctx.invoices.require(&invoice.id).await.unwrap().status,
            InvoiceStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_create_invoice_validation() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.finance();
        vm.ready().await.unwrap();

        let empty = Invoice::new("INV-9", "c", "C", day(1), day(2));
        assert!(vm.create_invoice(empty).await.is_err());

        vm.create_invoice(draft_invoice("INV-002")).await.unwrap();
        let duplicate = vm.create_invoice(draft_invoice("inv-002")).await.unwrap_err();
        assert!(matches!(duplicate, ViewModelError::Validation(_)));
    }

    #[tokio::test]
    async fn test_mark_overdue_only_touches_sent_past_due() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.finance();
        vm.ready().await.unwrap();

        let sent = vm.create_invoice(draft_invoice("INV-010")).await.unwrap();
        vm.send_invoice(&sent.id).await.unwrap();
        let draft = vm.create_invoice(draft_invoice("INV-011")).await.unwrap();

        assert!(vm.mark_overdue(day(15)).await.unwrap().is_empty());

        let marked = vm.mark_overdue(day(16)).await.unwrap();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].id, sent.id);
        assert_eq!(marked[0].status, InvoiceStatus::Overdue);
        assert_eq!(
            vm.invoices_by_status(InvoiceStatus::Draft)
                .into_iter()
                .map(|i| i.id)
                .collect::<Vec<_>>(),
            vec![draft.id]
        );
    }

    #[tokio::test]
    async fn test_budget_summaries() {
        let (ctx, _temp) = test_context().await;
        let vm = ctx.finance();
        vm.ready().await.unwrap();

        let supplies = vm
            .set_budget(Budget::new("Supplies May", "supplies", Decimal::from(200), day(1), day(31)))
            .await
            .unwrap();
        vm.set_budget(Budget::new("Nothing", "misc", Decimal::ZERO, day(1), day(31)))
            .await
            .unwrap();

        for (amount, category, date) in [
            (120, "supplies", day(3)),
            (100, "Supplies", day(20)),
            (999, "supplies", NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            (40, "repairs", day(4)),
        ] {
            vm.add_transaction(Transaction::expense(Decimal::from(amount), category, date))
                .await
                .unwrap();
        }

        let summaries = vm.budget_summaries();
        let supplies_summary = summaries.iter().find(|s| s.budget.id == supplies.id).unwrap();
        assert_eq!(supplies_summary.spent, Decimal::from(220));
        assert_eq!(supplies_summary.remaining, Decimal::from(-20));
        assert_eq!(supplies_summary.utilization, Decimal::from(110));
        assert!(supplies_summary.over_budget);

        let misc = summaries.iter().find(|s| s.budget.category == "misc").unwrap();
        assert_eq!(misc.utilization, Decimal::ZERO);
        assert!(!misc.over_budget);

        let inverted = Budget::new("Bad", "x", Decimal::ONE, day(10), day(1));
        assert!(vm.set_budget(inverted).await.is_err());
        vm.delete_budget(&supplies.id).await.unwrap();
        assert_eq!(vm.budget_summaries().len(), 1);
    }
}
