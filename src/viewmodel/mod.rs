//! Per-module state holders. Each one binds the collections it shows,
//! turns user actions into repository calls, and computes derived values
//! over what is currently loaded.

mod exam;
mod finance;
mod hr;
mod inventory;
mod state;
mod student;
mod teacher;

pub use exam::ExamViewModel;
pub use finance::{BudgetSummary, FinanceViewModel};
pub use hr::HrViewModel;
pub use inventory::InventoryViewModel;
pub use state::{CollectionState, UiState};
pub use student::StudentViewModel;
pub use teacher::TeacherViewModel;

use std::fmt::Display;

use crate::models::{Collection, InvoiceStatus, LeaveStatus, QuizStatus};
use crate::repository::RepositoryError;

#[derive(Debug)]
pub enum ViewModelError {
    Repository(RepositoryError),
    NotFound { kind: &'static str, id: String },
    InvalidTransition { kind: &'static str, from: String, to: String },
    Validation(String),
    /// A collection failed to load, so checks against it cannot run.
    Unavailable { collection: Collection, message: String },
}

impl std::fmt::Display for ViewModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewModelError::Repository(e) => write!(f, "{}", e),
            ViewModelError::NotFound { kind, id } => write!(f, "{} not found: {}", kind, id),
            ViewModelError::InvalidTransition { kind, from, to } => {
                write!(f, "Cannot move {} from '{}' to '{}'", kind, from, to)
            }
            ViewModelError::Validation(message) => write!(f, "{}", message),
            ViewModelError::Unavailable { collection, message } => {
                write!(f, "Could not load {}: {}", collection, message)
            }
        }
    }
}

impl std::error::Error for ViewModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewModelError::Repository(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RepositoryError> for ViewModelError {
    fn from(e: RepositoryError) -> Self {
        ViewModelError::Repository(e)
    }
}

pub type Result<T> = std::result::Result<T, ViewModelError>;

fn not_found(kind: &'static str, id: &str) -> ViewModelError {
    ViewModelError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn validation(message: impl Into<String>) -> ViewModelError {
    ViewModelError::Validation(message.into())
}

/// Status types with a fixed transition table.
trait Lifecycle: Copy + Display {
    const KIND: &'static str;

    fn allows(self, next: Self) -> bool;
}

impl Lifecycle for InvoiceStatus {
    const KIND: &'static str = "invoice";

    fn allows(self, next: Self) -> bool {
        self.can_transition_to(next)
    }
}

impl Lifecycle for LeaveStatus {
    const KIND: &'static str = "leave request";

    fn allows(self, next: Self) -> bool {
        self.can_transition_to(next)
    }
}

impl Lifecycle for QuizStatus {
    const KIND: &'static str = "quiz";

    fn allows(self, next: Self) -> bool {
        self.can_transition_to(next)
    }
}

fn ensure_transition<S: Lifecycle>(from: S, to: S) -> Result<()> {
    if from.allows(to) {
        Ok(())
    } else {
        Err(ViewModelError::InvalidTransition {
            kind: S::KIND,
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Case-insensitive substring match.
fn matches_query(haystack: &str, query: &str) -> bool {
    haystack.to_lowercase().contains(&query.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert!(ensure_transition(InvoiceStatus::Draft, InvoiceStatus::Sent).is_ok());
        assert!(ensure_transition(InvoiceStatus::Overdue, InvoiceStatus::Paid).is_ok());
        assert!(ensure_transition(InvoiceStatus::Paid, InvoiceStatus::Cancelled).is_err());
        assert!(ensure_transition(LeaveStatus::Approved, LeaveStatus::Cancelled).is_ok());
        assert!(ensure_transition(LeaveStatus::Rejected, LeaveStatus::Approved).is_err());
        assert!(ensure_transition(QuizStatus::Closed, QuizStatus::Published).is_err());

        let err = ensure_transition(InvoiceStatus::Draft, InvoiceStatus::Paid).unwrap_err();
        assert_eq!(err.to_string(), "Cannot move invoice from 'draft' to 'paid'");
    }
}
