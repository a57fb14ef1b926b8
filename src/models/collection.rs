//! Collection naming shared by the local cache, the outbox and the remote store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Remote collections, one per entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Transactions,
    Invoices,
    Budgets,
    Employees,
    LeaveRequests,
    Products,
    Vendors,
    Quizzes,
    Students,
    Teachers,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Transactions,
        Collection::Invoices,
        Collection::Budgets,
        Collection::Employees,
        Collection::LeaveRequests,
        Collection::Products,
        Collection::Vendors,
        Collection::Quizzes,
        Collection::Students,
        Collection::Teachers,
    ];

    /// Returns the collection path used by the remote store.
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Transactions => "transactions",
            Collection::Invoices => "invoices",
            Collection::Budgets => "budgets",
            Collection::Employees => "employees",
            Collection::LeaveRequests => "leave_requests",
            Collection::Products => "products",
            Collection::Vendors => "vendors",
            Collection::Quizzes => "quizzes",
            Collection::Students => "students",
            Collection::Teachers => "teachers",
        }
    }

    /// Parse from a collection path.
    pub fn parse(s: &str) -> Option<Self> {
        Collection::ALL
            .into_iter()
            .find(|c| c.path() == s.to_lowercase())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A flat business record that can be cached locally and mirrored remotely.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

/// Generates a fresh entity identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_paths_roundtrip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::parse(collection.path()), Some(collection));
        }
    }

    #[test]
    fn test_collection_parse_case_insensitive() {
        assert_eq!(
            Collection::parse("LEAVE_REQUESTS"),
            Some(Collection::LeaveRequests)
        );
        assert_eq!(Collection::parse("library_books"), None);
        assert_eq!(Collection::parse(""), None);
    }

    #[test]
    fn test_new_id_is_unique_uuid() {
        let a = new_id();
        let b = new_id();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }
}
