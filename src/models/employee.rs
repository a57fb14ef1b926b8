use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::collection::{new_id, Collection, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    Active,
    OnLeave,
    Terminated,
}

super::text_enum!(EmployeeStatus {
    Active => "active",
    OnLeave => "on_leave",
    Terminated => "terminated",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: String,
    pub position: String,
    pub hire_date: NaiveDate,
    pub salary: Decimal,
    pub status: EmployeeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        department: impl Into<String>,
        position: impl Into<String>,
        hire_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: String::new(),
            phone: None,
            department: department.into(),
            position: position.into(),
            hire_date,
            salary: Decimal::ZERO,
            status: EmployeeStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_salary(mut self, salary: Decimal) -> Self {
        self.salary = salary;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Entity for Employee {
    const COLLECTION: Collection = Collection::Employees;

    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Employee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.full_name();
        writeln!(f, "{}", name)?;
        writeln!(f, "{}", "=".repeat(name.len()))?;
        writeln!(f, "Position:   {} ({})", self.position, self.department)?;
        writeln!(f, "Hired:      {}", self.hire_date)?;
        writeln!(f, "Status:     {}", self.status)?;
        if !self.email.is_empty() {
            writeln!(f, "Email:      {}", self.email)?;
        }
        if let Some(phone) = &self.phone {
            writeln!(f, "Phone:      {}", phone)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_employee_new_defaults() {
        let hired = NaiveDate::from_ymd_opt(2020, 8, 15).unwrap();
        let employee = Employee::new("Ada", "Obi", "Science", "Teacher", hired);

        assert_eq!(employee.full_name(), "Ada Obi");
        assert_eq!(employee.status, EmployeeStatus::Active);
        assert_eq!(employee.salary, Decimal::ZERO);
        assert!(employee.phone.is_none());
    }

    #[test]
    fn test_status_text_matches_serde() {
        let json = serde_json::to_string(&EmployeeStatus::OnLeave).unwrap();
        assert_eq!(json, "\"on_leave\"");
        assert_eq!(EmployeeStatus::OnLeave.to_string(), "on_leave");
        assert_eq!(
            EmployeeStatus::from_str("On_Leave").unwrap(),
            EmployeeStatus::OnLeave
        );
    }
}
