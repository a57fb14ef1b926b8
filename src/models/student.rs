use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::collection::{new_id, Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Graduated,
    Withdrawn,
}

super::text_enum!(StudentStatus {
    Active => "active",
    Graduated => "graduated",
    Withdrawn => "withdrawn",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub class_name: String,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub status: StudentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn new(
        admission_number: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        class_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            admission_number: admission_number.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            class_name: class_name.into(),
            guardian_name: String::new(),
            guardian_phone: String::new(),
            date_of_birth: None,
            status: StudentStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_guardian(mut self, name: impl Into<String>, phone: impl Into<String>) -> Self {
        self.guardian_name = name.into();
        self.guardian_phone = phone.into();
        self
    }

    pub fn with_date_of_birth(mut self, date_of_birth: NaiveDate) -> Self {
        self.date_of_birth = Some(date_of_birth);
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Entity for Student {
    const COLLECTION: Collection = Collection::Students;

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.full_name();
        writeln!(f, "{}", name)?;
        writeln!(f, "{}", "=".repeat(name.len()))?;
        writeln!(f, "Admission: {}", self.admission_number)?;
        writeln!(f, "Class:     {}", self.class_name)?;
        writeln!(f, "Status:    {}", self.status)?;
        if let Some(dob) = self.date_of_birth {
            writeln!(f, "Born:      {}", dob)?;
        }
        if !self.guardian_name.is_empty() {
            writeln!(f, "Guardian:  {} {}", self.guardian_name, self.guardian_phone)?;
        }
        Ok(())
    }
}
