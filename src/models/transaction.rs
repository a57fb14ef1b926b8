use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::collection::{new_id, Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

super::text_enum!(TransactionKind {
    Income => "income",
    Expense => "expense",
});

/// A single ledger movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
    /// Entity this movement settles, e.g. an invoice id.
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        amount: Decimal,
        category: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            kind,
            amount,
            category: category.into(),
            description: String::new(),
            date,
            reference_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn income(amount: Decimal, category: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(TransactionKind::Income, amount, category, date)
    }

    pub fn expense(amount: Decimal, category: impl Into<String>, date: NaiveDate) -> Self {
        Self::new(TransactionKind::Expense, amount, category, date)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    /// Amount with the sign applied: income positive, expense negative.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

impl Entity for Transaction {
    const COLLECTION: Collection = Collection::Transactions;

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>10} {} [{}]",
            self.date,
            self.signed_amount().to_string(),
            self.kind,
            self.category
        )?;
        if !self.description.is_empty() {
            write!(f, " {}", self.description)?;
        }
        Ok(())
    }
}
