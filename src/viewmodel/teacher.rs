use std::sync::Arc;

use super::{not_found, validation, CollectionState, Result};
use crate::app::{EmployeeRepository, TeacherRepository};
use crate::models::{Employee, Teacher};

pub struct TeacherViewModel {
    teacher_repo: Arc<TeacherRepository>,
    employee_repo: Arc<EmployeeRepository>,
    pub teachers: CollectionState<Teacher>,
}

impl TeacherViewModel {
    pub fn new(teacher_repo: Arc<TeacherRepository>, employee_repo: Arc<EmployeeRepository>) -> Self {
        Self {
            teachers: CollectionState::bind(teacher_repo.clone()),
            teacher_repo,
            employee_repo,
        }
    }

    pub async fn ready(&self) -> Result<()> {
        self.teachers.loaded().await?;
        Ok(())
    }

    pub async fn add_teacher(&self, mut teacher: Teacher) -> Result<Teacher> {
        if teacher.first_name.trim().is_empty() || teacher.last_name.trim().is_empty() {
            return Err(validation("Teacher first and last name are required"));
        }
        teacher.subjects.retain(|s| !s.trim().is_empty());
        self.teacher_repo.save(&teacher).await?;
        Ok(teacher)
    }

    pub async fn remove_teacher(&self, id: &str) -> Result<()> {
        if !self.teacher_repo.delete(id).await? {
            return Err(not_found("Teacher", id));
        }
        Ok(())
    }

    pub fn teachers_for_subject(&self, subject: &str) -> Vec<Teacher> {
        self.teachers
            .items()
            .into_iter()
            .filter(|t| t.teaches(subject))
            .collect()
    }

    /// The HR record linked to the teacher. `None` when there is no link or
    /// the linked employee no longer exists.
    pub async fn employee_record(&self, teacher_id: &str) -> Result<Option<Employee>> {
        let teacher = self
            .teacher_repo
            .get_by_id(teacher_id)
            .await?
            .ok_or_else(|| not_found("Teacher", teacher_id))?;
        match teacher.employee_id {
            Some(employee_id) => Ok(self.employee_repo.get_by_id(&employee_id).await?),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::test_context;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_subject_lookup_and_employee_link() {
        let (ctx, _temp) = test_context().await;
        let hr = ctx.hr();
        let vm = ctx.teacher();
        vm.ready().await.unwrap();
        hr.ready().await.unwrap();

        let employee = hr
            .add_employee(Employee::new(
                "Ngozi",
                "Obi",
                "Science",
                "Teacher",
                NaiveDate::from_ymd_opt(2020, 1, 6).unwrap(),
            ))
            .await
            .unwrap();

        let linked = vm
            .add_teacher(
                Teacher::new("Ngozi", "Obi")
                    .with_subjects(vec!["Physics".into(), "Mathematics".into()])
                    .with_employee(&employee.id),
            )
            .await
            .unwrap();
        let dangling = vm
            .add_teacher(
                Teacher::new("Musa", "Ali")
                    .with_subjects(vec!["physics".into()])
                    .with_employee("gone"),
            )
            .await
            .unwrap();
        let unlinked = vm.add_teacher(Teacher::new("Efe", "Ighalo")).await.unwrap();

        assert_eq!(vm.teachers_for_subject("PHYSICS").len(), 2);
        assert_eq!(vm.teachers_for_subject("mathematics"), vec![linked.clone()]);
        assert!(vm.teachers_for_subject("Music").is_empty());

        assert_eq!(vm.employee_record(&linked.id).await.unwrap(), Some(employee));
        assert_eq!(vm.employee_record(&dangling.id).await.unwrap(), None);
        assert_eq!(vm.employee_record(&unlinked.id).await.unwrap(), None);

        vm.remove_teacher(&dangling.id).await.unwrap();
        assert_eq!(vm.teachers_for_subject("physics").len(), 1);
    }
}
