use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{matches_query, not_found, validation, CollectionState, Result};
use crate::app::StudentRepository;
use crate::models::{Student, StudentStatus};

pub struct StudentViewModel {
    student_repo: Arc<StudentRepository>,
    pub students: CollectionState<Student>,
}

impl StudentViewModel {
    pub fn new(student_repo: Arc<StudentRepository>) -> Self {
        Self {
            students: CollectionState::bind(student_repo.clone()),
            student_repo,
        }
    }

    pub async fn ready(&self) -> Result<()> {
        self.students.loaded().await?;
        Ok(())
    }

    pub async fn enroll_student(&self, mut student: Student) -> Result<Student> {
        self.validate(&student)?;
        student.status = StudentStatus::Active;
        self.student_repo.save(&student).await?;
        tracing::info!(admission = %student.admission_number, class = %student.class_name, "student enrolled");
        Ok(student)
    }

    pub async fn update_student(&self, mut student: Student) -> Result<Student> {
        self.validate(&student)?;
        if self.student_repo.get_by_id(&student.id).await?.is_none() {
            return Err(not_found("Student", &student.id));
        }
        student.updated_at = Utc::now();
        self.student_repo.save(&student).await?;
        Ok(student)
    }

    pub async fn withdraw_student(&self, id: &str) -> Result<Student> {
        let mut student = self
            .student_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("Student", id))?;
        if student.status != StudentStatus::Active {
            return Err(validation(format!(
                "{} is already {}",
                student.full_name(),
                student.status
            )));
        }
        student.status = StudentStatus::Withdrawn;
        student.updated_at = Utc::now();
        self.student_repo.save(&student).await?;
        Ok(student)
    }

    pub async fn remove_student(&self, id: &str) -> Result<()> {
        if !self.student_repo.delete(id).await? {
            return Err(not_found("Student", id));
        }
        Ok(())
    }

    pub fn students_in_class(&self, class_name: &str) -> Vec<Student> {
        self.students
            .items()
            .into_iter()
            .filter(|s| s.class_name.eq_ignore_ascii_case(class_name))
            .collect()
    }

    /// Active students per class.
    pub fn class_sizes(&self) -> BTreeMap<String, usize> {
        let mut sizes = BTreeMap::new();
        for student in self.students.items() {
            if student.status == StudentStatus::Active {
                *sizes.entry(student.class_name).or_insert(0) += 1;
            }
        }
        sizes
    }

    /// Name or admission number contains `query`, ignoring case. Sorted by
    /// last then first name.
    pub fn search_students(&self, query: &str) -> Vec<Student> {
        let mut found: Vec<Student> = self
            .students
            .items()
            .into_iter()
            .filter(|s| {
                matches_query(&s.full_name(), query) || matches_query(&s.admission_number, query)
            })
            .collect();
        found.sort_by(|a, b| {
            (a.last_name.to_lowercase(), a.first_name.to_lowercase())
                .cmp(&(b.last_name.to_lowercase(), b.first_name.to_lowercase()))
        });
        found
    }

    fn validate(&self, student: &Student) -> Result<()> {
        if student.admission_number.trim().is_empty() {
            return Err(validation("Admission number is required"));
        }
        if student.first_name.trim().is_empty() || student.last_name.trim().is_empty() {
            return Err(validation("Student first and last name are required"));
        }
        if student.class_name.trim().is_empty() {
            return Err(validation("Class is required"));
        }
        let taken = self.students.items().into_iter().any(|other| {
            other.id != student.id
                && other
                    .admission_number
                    .eq_ignore_ascii_case(&student.admission_number)
        });
        if taken {
            return Err(validation(format!(
                "Admission number '{}' is already used",
                student.admission_number
            )));
        }
        Ok(())
    }
}
