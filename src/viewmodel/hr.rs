use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use super::{ensure_transition, not_found, validation, CollectionState, Result};
use crate::app::{EmployeeRepository, LeaveRequestRepository};
use crate::models::{Employee, LeaveRequest, LeaveStatus, LeaveType};

pub struct HrViewModel {
    employee_repo: Arc<EmployeeRepository>,
    leave_repo: Arc<LeaveRequestRepository>,
    pub employees: CollectionState<Employee>,
    pub leave_requests: CollectionState<LeaveRequest>,
}

impl HrViewModel {
    pub fn new(employee_repo: Arc<EmployeeRepository>, leave_repo: Arc<LeaveRequestRepository>) -> Self {
        Self {
            employees: CollectionState::bind(employee_repo.clone()),
            leave_requests: CollectionState::bind(leave_repo.clone()),
            employee_repo,
            leave_repo,
        }
    }

    pub async fn ready(&self) -> Result<()> {
        self.employees.loaded().await?;
        self.leave_requests.loaded().await?;
        Ok(())
    }

    pub async fn add_employee(&self, employee: Employee) -> Result<Employee> {
        validate_employee(&employee)?;
        self.employee_repo.save(&employee).await?;
        Ok(employee)
    }

    pub async fn update_employee(&self, mut employee: Employee) -> Result<Employee> {
        validate_employee(&employee)?;
        if self.employee_repo.get_by_id(&employee.id).await?.is_none() {
            return Err(not_found("Employee", &employee.id));
        }
        employee.updated_at = Utc::now();
        self.employee_repo.save(&employee).await?;
        Ok(employee)
    }

    /// Leave requests referencing the employee are kept.
    pub async fn remove_employee(&self, id: &str) -> Result<()> {
        if !self.employee_repo.delete(id).await? {
            return Err(not_found("Employee", id));
        }
        Ok(())
    }

    pub fn employees_in_department(&self, department: &str) -> Vec<Employee> {
        self.employees
            .items()
            .into_iter()
            .filter(|e| e.department.eq_ignore_ascii_case(department))
            .collect()
    }

    pub fn employee_name(&self, id: &str) -> Option<String> {
        self.employees.find(id).map(|e| e.full_name())
    }

    pub async fn request_leave(
        &self,
        employee_id: &str,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: &str,
    ) -> Result<LeaveRequest> {
        if self.employee_repo.get_by_id(employee_id).await?.is_none() {
            return Err(not_found("Employee", employee_id));
        }
        if end_date < start_date {
            return Err(validation("Leave cannot end before it starts"));
        }

        let request = LeaveRequest::new(employee_id, leave_type, start_date, end_date).with_reason(reason);
        let clash = self.leave_requests.items().into_iter().find(|existing| {
            existing.employee_id == employee_id
                && matches!(existing.status, LeaveStatus::Pending | LeaveStatus::Approved)
                && existing.overlaps(&request)
        });
        if let Some(existing) = clash {
            return Err(validation(format!(
                "Overlaps {} leave from {} to {}",
                existing.status, existing.start_date, existing.end_date
            )));
        }

        self.leave_repo.save(&request).await?;
        Ok(request)
    }

    pub async fn approve_leave(&self, id: &str, reviewer: &str) -> Result<LeaveRequest> {
        self.decide(id, LeaveStatus::Approved, Some(reviewer)).await
    }

    pub async fn reject_leave(&self, id: &str, reviewer: &str) -> Result<LeaveRequest> {
        self.decide(id, LeaveStatus::Rejected, Some(reviewer)).await
    }

    pub async fn cancel_leave(&self, id: &str) -> Result<LeaveRequest> {
        self.decide(id, LeaveStatus::Cancelled, None).await
    }

    pub fn pending_leave_requests(&self) -> Vec<LeaveRequest> {
        self.leave_requests
            .items()
            .into_iter()
            .filter(|l| l.status == LeaveStatus::Pending)
            .collect()
    }

    pub fn leave_requests_for(&self, employee_id: &str) -> Vec<LeaveRequest> {
        self.leave_requests
            .items()
            .into_iter()
            .filter(|l| l.employee_id == employee_id)
            .collect()
    }

    /// Working days of approved leave taken by the employee within `year`.
    pub fn approved_leave_days(&self, employee_id: &str, year: i32) -> i64 {
        self.leave_requests_for(employee_id)
            .iter()
            .filter(|l| l.status == LeaveStatus::Approved)
            .map(|l| l.working_days_in_year(year))
            .sum()
    }

    async fn decide(&self, id: &str, next: LeaveStatus, reviewer: Option<&str>) -> Result<LeaveRequest> {
        let mut request = self
            .leave_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("Leave request", id))?;
        ensure_transition(request.status, next)?;
        request.status = next;
        if let Some(reviewer) = reviewer {
            request.reviewed_by = Some(reviewer.to_string());
        }
        request.updated_at = Utc::now();
        self.leave_repo.save(&request).await?;
        Ok(request)
    }
}

fn validate_employee(employee: &Employee) -> Result<()> {
    if employee.first_name.trim().is_empty() || employee.last_name.trim().is_empty() {
        return Err(validation("Employee first and last name are required"));
    }
    if employee.department.trim().is_empty() {
        return Err(validation("Employee department is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::test_context;
    use crate::viewmodel::ViewModelError;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    async fn with_employee() -> (HrViewModel, Employee, tempfile::TempDir) {
        let (ctx, temp) = test_context().await;
        let vm = ctx.hr();
        vm.ready().await.unwrap();
        let employee = vm
            .add_employee(Employee::new("Grace", "Nwosu", "Science", "Teacher", date(1, 6)))
            .await
            .unwrap();
        (vm, employee, temp)
    }

    #[tokio::test]
    async fn test_employee_queries() {
        let (vm, grace, _temp) = with_employee().await;
        vm.add_employee(Employee::new("Ibrahim", "Sani", "Admin", "Clerk", date(2, 1)))
            .await
            .unwrap();

        let science = vm.employees_in_department("science");
        assert_eq!(science, vec![grace.clone()]);
        assert_eq!(vm.employee_name(&grace.id).as_deref(), Some("Grace Nwosu"));
        assert_eq!(vm.employee_name("missing"), None);

        let mut promoted = grace.clone();
        promoted.position = "Head of Science".to_string();
        vm.update_employee(promoted).await.unwrap();
        assert_eq!(vm.employees_in_department("Science")[0].position, "Head of Science");

        vm.remove_employee(&grace.id).await.unwrap();
        assert_eq!(vm.employee_name(&grace.id), None);
    }

    #[tokio::test]
    async fn test_request_leave_validation() {
        let (vm, grace, _temp) = with_employee().await;

        let unknown = vm
            .request_leave("nobody", LeaveType::Annual, date(7, 1), date(7, 2), "")
            .await
            .unwrap_err();
        assert!(matches!(unknown, ViewModelError::NotFound { .. }));

        let inverted = vm
            .request_leave(&grace.id, LeaveType::Annual, date(7, 5), date(7, 1), "")
            .await
            .unwrap_err();
        assert!(matches!(inverted, ViewModelError::Validation(_)));

        vm.request_leave(&grace.id, LeaveType::Annual, date(7, 7), date(7, 11), "Trip")
            .await
            .unwrap();
        let overlapping = vm
            .request_leave(&grace.id, LeaveType::Sick, date(7, 10), date(7, 14), "")
            .await
            .unwrap_err();
        assert!(matches!(overlapping, ViewModelError::Validation(_)));
        assert_eq!(vm.pending_leave_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_leave_decisions_follow_transitions() {
        let (vm, grace, _temp) = with_employee().await;
        let request = vm
            .request_leave(&grace.id, LeaveType::Annual, date(7, 7), date(7, 11), "Trip")
            .await
            .unwrap();

        let approved = vm.approve_leave(&request.id, "principal").await.unwrap();
        assert_eq!(approved.status, LeaveStatus::Approved);
        assert_eq!(approved.reviewed_by.as_deref(), Some("principal"));
        assert!(vm.pending_leave_requests().is_empty());

        let err = vm.reject_leave(&request.id, "principal").await.unwrap_err();
        assert!(matches!(err, ViewModelError::InvalidTransition { .. }));
        assert_eq!(vm.leave_requests_for(&grace.id)[0].status, LeaveStatus::Approved);

        let cancelled = vm.cancel_leave(&request.id).await.unwrap();
        assert_eq!(cancelled.status, LeaveStatus::Cancelled);
        assert!(vm.approve_leave(&request.id, "principal").await.is_err());
    }

    #[tokio::test]
    async fn test_approved_leave_days_clipped_to_year() {
        let (vm, grace, _temp) = with_employee().await;

        // Mon 29 Dec 2025 to Fri 2 Jan 2026: 3 working days in 2025.
        let new_year = vm
            .request_leave(
                &grace.id,
                LeaveType::Annual,
                date(12, 29),
                NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
                "",
            )
            .await
            .unwrap();
        // Mon 7 to Sun 13 July: 5 working days.
        let july = vm
            .request_leave(&grace.id, LeaveType::Annual, date(7, 7), date(7, 13), "")
            .await
            .unwrap();
        // Still pending: not counted.
        vm.request_leave(&grace.id, LeaveType::Sick, date(3, 3), date(3, 4), "")
            .await
            .unwrap();

        vm.approve_leave(&new_year.id, "hr").await.unwrap();
        vm.approve_leave(&july.id, "hr").await.unwrap();

        assert_eq!(vm.approved_leave_days(&grace.id, 2025), 8);
        assert_eq!(vm.approved_leave_days(&grace.id, 2026), 2);
        assert_eq!(july.total_days(), 7);
    }
}
