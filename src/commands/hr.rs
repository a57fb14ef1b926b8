use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Subcommand};
use rust_decimal::Decimal;

use super::{print_json, truncate, CommandResult, OutputFormat};
use school_erp::app::AppContext;
use school_erp::config::Config;
use school_erp::models::{Employee, LeaveRequest, LeaveStatus, LeaveType};

#[derive(Args)]
pub struct HrCommand {
    #[command(subcommand)]
    pub command: HrSubcommand,
}

#[derive(Subcommand)]
pub enum HrSubcommand {
    /// Staff records
    Employee {
        #[command(subcommand)]
        command: EmployeeSubcommand,
    },

    /// Leave requests
    Leave {
        #[command(subcommand)]
        command: LeaveSubcommand,
    },
}

#[derive(Subcommand)]
pub enum EmployeeSubcommand {
    /// Add an employee
    Add {
        first_name: String,

        last_name: String,

        #[arg(long)]
        department: String,

        #[arg(long)]
        position: String,

        /// Hire date (default: today)
        #[arg(long)]
        hire_date: Option<NaiveDate>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,

        /// Monthly salary
        #[arg(long)]
        salary: Option<Decimal>,
    },

    /// List employees
    List {
        /// Filter by department
        #[arg(long)]
        department: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show an employee and their leave this year
    Show {
        /// Employee ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Remove an employee
    Remove {
        /// Employee ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum LeaveSubcommand {
    /// Request leave for an employee
    Request {
        /// Employee ID
        employee_id: String,

        /// First day of leave
        start: NaiveDate,

        /// Last day of leave
        end: NaiveDate,

        /// annual, sick, maternity, unpaid or other
        #[arg(long = "type", default_value = "annual")]
        leave_type: LeaveType,

        #[arg(long, default_value = "")]
        reason: String,
    },

    /// List leave requests
    List {
        /// Only requests awaiting a decision
        #[arg(long, conflicts_with = "status")]
        pending: bool,

        /// Filter by status
        #[arg(long)]
        status: Option<LeaveStatus>,

        /// Filter by employee ID
        #[arg(long)]
        employee: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Approve a pending request
    Approve {
        /// Leave request ID
        id: String,
    },

    /// Reject a pending request
    Reject {
        /// Leave request ID
        id: String,
    },

    /// Cancel a pending or approved request
    Cancel {
        /// Leave request ID
        id: String,
    },
}

impl HrCommand {
    /// True for subcommands that change records.
    pub fn writes(&self) -> bool {
        match &self.command {
            HrSubcommand::Employee { command } => matches!(
                command,
                EmployeeSubcommand::Add { .. } | EmployeeSubcommand::Remove { .. }
            ),
            HrSubcommand::Leave { command } => !matches!(command, LeaveSubcommand::List { .. }),
        }
    }

    pub async fn run(&self, ctx: &AppContext, config: &Config) -> CommandResult {
        match &self.command {
            HrSubcommand::Employee { command } => run_employee(command, ctx).await,
            HrSubcommand::Leave { command } => run_leave(command, ctx, config).await,
        }
    }
}

async fn run_employee(command: &EmployeeSubcommand, ctx: &AppContext) -> CommandResult {
    match command {
        EmployeeSubcommand::Add {
            first_name,
            last_name,
            department,
            position,
            hire_date,
            email,
            phone,
            salary,
        } => {
            let hire_date = hire_date.unwrap_or_else(|| Local::now().date_naive());
            let mut employee = Employee::new(
                first_name.trim(),
                last_name.trim(),
                department.trim(),
                position.trim(),
                hire_date,
            );
            if let Some(email) = email {
                employee = employee.with_email(email);
            }
            if let Some(phone) = phone {
                employee = employee.with_phone(phone);
            }
            if let Some(salary) = salary {
                employee = employee.with_salary(*salary);
            }

            let vm = ctx.hr();
            vm.ready().await?;
            let created = vm.add_employee(employee).await?;
            println!("Added employee:");
            println!("{}", created);
            Ok(())
        }

        EmployeeSubcommand::List { department, format } => {
            let employees = match department {
                Some(department) => ctx.employees.dao().list_by_department(department).await?,
                None => ctx.employees.list().await?,
            };

            if employees.is_empty() {
                println!("No employees found");
                return Ok(());
            }

            match format {
                OutputFormat::Json => print_json(&employees),
                OutputFormat::Text => {
                    println!(
                        "{:<36}  {:<24}  {:<14}  {:<18}  STATUS",
                        "ID", "NAME", "DEPARTMENT", "POSITION"
                    );
                    println!("{}", "-".repeat(106));
                    for employee in &employees {
                        println!(
                            "{:<36}  {:<24}  {:<14}  {:<18}  {}",
                            employee.id,
                            truncate(&employee.full_name(), 24),
                            truncate(&employee.department, 14),
                            truncate(&employee.position, 18),
                            employee.status
                        );
                    }
                    println!("\nTotal: {} employee(s)", employees.len());
                    Ok(())
                }
            }
        }

        EmployeeSubcommand::Show { id, format } => {
            let vm = ctx.hr();
            vm.ready().await?;
            let employee = vm
                .employees
                .find(id)
                .ok_or_else(|| format!("Employee not found: {}", id))?;
            let year = Local::now().year();
            let leave_days = vm.approved_leave_days(id, year);

            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "employee": employee,
                    "approved_leave_days": leave_days,
                    "year": year,
                })),
                OutputFormat::Text => {
                    println!("{}", employee);
                    println!("Approved leave in {}: {} working day(s)", year, leave_days);
                    Ok(())
                }
            }
        }

        EmployeeSubcommand::Remove { id } => {
            let vm = ctx.hr();
            vm.ready().await?;
            let name = vm.employee_name(id);
            vm.remove_employee(id).await?;
            println!("Removed employee: {}", name.as_deref().unwrap_or(id));
            Ok(())
        }
    }
}

fn print_leave_table(requests: &[LeaveRequest], names: impl Fn(&str) -> Option<String>) {
    println!(
        "{:<36}  {:<22}  {:<9}  {:<10}  {:<10}  {:>4}  STATUS",
        "ID", "EMPLOYEE", "TYPE", "START", "END", "DAYS"
    );
    println!("{}", "-".repeat(112));
    for request in requests {
        let employee = names(&request.employee_id).unwrap_or_else(|| request.employee_id.clone());
        println!(
            "{:<36}  {:<22}  {:<9}  {:<10}  {:<10}  {:>4}  {}",
            request.id,
            truncate(&employee, 22),
            request.leave_type.to_string(),
            request.start_date,
            request.end_date,
            request.working_days(),
            request.status
        );
    }
    println!("\nTotal: {} request(s)", requests.len());
}

async fn run_leave(command: &LeaveSubcommand, ctx: &AppContext, config: &Config) -> CommandResult {
    let vm = ctx.hr();
    vm.ready().await?;
    let reviewer = &config.operator.value;

    match command {
        LeaveSubcommand::Request {
            employee_id,
            start,
            end,
            leave_type,
            reason,
        } => {
            let request = vm
                .request_leave(employee_id, *leave_type, *start, *end, reason)
                .await?;
            println!("Leave requested:");
            println!("{}", request);
            println!("ID: {}", request.id);
            Ok(())
        }

        LeaveSubcommand::List {
            pending,
            status,
            employee,
            format,
        } => {
            let dao = ctx.leave_requests.dao();
            let mut requests = match (pending, status, employee) {
                (true, _, _) => dao.list_pending().await?,
                (false, Some(status), _) => dao.list_by_status(*status).await?,
                (false, None, Some(employee)) => dao.list_for_employee(employee).await?,
                (false, None, None) => ctx.leave_requests.list().await?,
            };
            if let Some(employee) = employee {
                requests.retain(|r| &r.employee_id == employee);
            }

            if requests.is_empty() {
                println!("No leave requests found");
                return Ok(());
            }

            match format {
                OutputFormat::Json => print_json(&requests),
                OutputFormat::Text => {
                    print_leave_table(&requests, |id| vm.employee_name(id));
                    Ok(())
                }
            }
        }

        LeaveSubcommand::Approve { id } => {
            let request = vm.approve_leave(id, reviewer).await?;
            println!("Approved: {}", request);
            Ok(())
        }

        LeaveSubcommand::Reject { id } => {
            let request = vm.reject_leave(id, reviewer).await?;
            println!("Rejected: {}", request);
            Ok(())
        }

        LeaveSubcommand::Cancel { id } => {
            let request = vm.cancel_leave(id).await?;
            println!("Cancelled: {}", request);
            Ok(())
        }
    }
}
