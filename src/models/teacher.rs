use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::collection::{new_id, Collection, Entity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub subjects: Vec<String>,
    /// HR record for this teacher, if one exists.
    pub employee_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Teacher {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: String::new(),
            subjects: Vec::new(),
            employee_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_subjects(mut self, subjects: Vec<String>) -> Self {
        self.subjects = subjects;
        self
    }

    pub fn with_employee(mut self, employee_id: impl Into<String>) -> Self {
        self.employee_id = Some(employee_id.into());
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn teaches(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s.eq_ignore_ascii_case(subject))
    }
}

impl Entity for Teacher {
    const COLLECTION: Collection = Collection::Teachers;

    fn id(&self) -> &str {
        &self.id
    }
}
