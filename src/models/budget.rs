use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::collection::{new_id, Collection, Entity};

/// Spending allowance for one expense category over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub name: String,
    pub category: String,
    pub allocated: Decimal,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        allocated: Decimal,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            category: category.into(),
            allocated,
            period_start,
            period_end,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.period_start && date <= self.period_end
    }
}

impl Entity for Budget {
    const COLLECTION: Collection = Collection::Budgets;

    fn id(&self) -> &str {
        &self.id
    }
}
