use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::collection::{new_id, Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

super::text_enum!(InvoiceStatus {
    Draft => "draft",
    Sent => "sent",
    Paid => "paid",
    Overdue => "overdue",
    Cancelled => "cancelled",
});

impl InvoiceStatus {
    pub fn can_transition_to(self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Draft, Cancelled)
                | (Sent, Paid)
                | (Sent, Overdue)
                | (Sent, Cancelled)
                | (Overdue, Paid)
                | (Overdue, Cancelled)
        )
    }

    /// Sent or overdue: money is still expected.
    pub fn is_outstanding(self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl InvoiceItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: String,
    pub customer_name: String,
    pub items: Vec<InvoiceItem>,
    /// Percent, e.g. 7.5 for 7.5%.
    pub tax_rate: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(
        invoice_number: impl Into<String>,
        customer_id: impl Into<String>,
        customer_name: impl Into<String>,
        issue_date: NaiveDate,
        due_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            invoice_number: invoice_number.into(),
            customer_id: customer_id.into(),
            customer_name: customer_name.into(),
            items: Vec::new(),
            tax_rate: Decimal::ZERO,
            issue_date,
            due_date,
            status: InvoiceStatus::Draft,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_items(mut self, items: Vec<InvoiceItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(InvoiceItem::line_total).sum()
    }

    pub fn tax(&self) -> Decimal {
        (self.subtotal() * self.tax_rate / Decimal::ONE_HUNDRED).round_dp(2)
    }

    pub fn total(&self) -> Decimal {
        self.subtotal() + self.tax()
    }

    /// True when the invoice is still awaiting payment after its due date.
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.status.is_outstanding() && self.due_date < today
    }
}

impl Entity for Invoice {
    const COLLECTION: Collection = Collection::Invoices;

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Invoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = format!("Invoice {}", self.invoice_number);
        writeln!(f, "{}", title)?;
        writeln!(f, "{}", "=".repeat(title.len()))?;
        writeln!(f, "Customer: {} ({})", self.customer_name, self.customer_id)?;
        writeln!(f, "Issued:   {}", self.issue_date)?;
        writeln!(f, "Due:      {}", self.due_date)?;
        writeln!(f, "Status:   {}", self.status)?;

        if !self.items.is_empty() {
            writeln!(f, "\nItems:")?;
            for item in &self.items {
                writeln!(
                    f,
                    "  - {} x {} @ {} = {}",
                    item.description,
                    item.quantity,
                    item.unit_price,
                    item.line_total()
                )?;
            }
        }

        writeln!(f, "\nSubtotal: {}", self.subtotal())?;
        writeln!(f, "Tax ({}%): {}", self.tax_rate, self.tax())?;
        writeln!(f, "Total:    {}", self.total())?;

        if let Some(notes) = &self.notes {
            writeln!(f, "\nNotes: {}", notes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, day).unwrap()
    }

    fn sample() -> Invoice {
        Invoice::new("INV-001", "cust-1", "Parent Association", d(1), d(15))
            .with_items(vec![
                InvoiceItem::new("Tuition", Decimal::from(2), Decimal::new(15000, 2)),
                InvoiceItem::new("Books", Decimal::from(1), Decimal::new(4550, 2)),
            ])
            .with_tax_rate(Decimal::new(75, 1))
    }

    #[test]
    fn test_totals() {
        let invoice = sample();
        assert_eq!(invoice.subtotal(), Decimal::new(34550, 2));
        // 345.50 * 7.5% = 25.9125 -> 25.91
        assert_eq!(invoice.tax(), Decimal::new(2591, 2));
        assert_eq!(invoice.total(), Decimal::new(37141, 2));
    }

    #[test]
    fn test_empty_invoice_totals_zero() {
        let invoice = Invoice::new("INV-002", "c", "C", d(1), d(2));
        assert_eq!(invoice.subtotal(), Decimal::ZERO);
        assert_eq!(invoice.total(), Decimal::ZERO);
    }

    #[test]
    fn test_status_transitions() {
        use InvoiceStatus::*;
        assert!(Draft.can_transition_to(Sent));
        assert!(Sent.can_transition_to(Paid));
        assert!(Overdue.can_transition_to(Paid));
        assert!(!Draft.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Sent));
    }

    #[test]
    fn test_is_past_due() {
        let mut invoice = sample();
        assert!(!invoice.is_past_due(d(20)), "drafts are never past due");

        invoice.status = InvoiceStatus::Sent;
        assert!(!invoice.is_past_due(d(15)));
        assert!(invoice.is_past_due(d(16)));

        invoice.status = InvoiceStatus::Paid;
        assert!(!invoice.is_past_due(d(30)));
    }

    #[test]
    fn test_display() {
        let output = format!("{}", sample());
        assert!(output.contains("Invoice INV-001"));
        assert!(output.contains("Tuition"));
        assert!(output.contains("371.41"));
    }
}
