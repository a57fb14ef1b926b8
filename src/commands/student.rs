use clap::{Args, Subcommand};
use chrono::NaiveDate;

use super::{print_json, truncate, CommandResult, OutputFormat};
use school_erp::app::AppContext;
use school_erp::models::Student;

#[derive(Args)]
pub struct StudentCommand {
    #[command(subcommand)]
    pub command: StudentSubcommand,
}

#[derive(Subcommand)]
pub enum StudentSubcommand {
    /// Enroll a student
    Add {
        /// Admission number, unique per student
        admission_number: String,

        first_name: String,

        last_name: String,

        /// Class, e.g. JSS1
        #[arg(long)]
        class: String,

        #[arg(long)]
        guardian: Option<String>,

        #[arg(long)]
        guardian_phone: Option<String>,

        /// Date of birth
        #[arg(long)]
        dob: Option<NaiveDate>,
    },

    /// List students
    List {
        /// Filter by class
        #[arg(long)]
        class: Option<String>,

        /// Name or admission number contains this text
        #[arg(long, conflicts_with = "class")]
        search: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Active students per class
    Classes {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a student's details
    Show {
        /// Student ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a student as withdrawn
    Withdraw {
        /// Student ID
        id: String,
    },

    /// Delete a student record
    Remove {
        /// Student ID
        id: String,
    },
}

impl StudentCommand {
    /// True for subcommands that change records.
    pub fn writes(&self) -> bool {
        matches!(
            self.command,
            StudentSubcommand::Add { .. } | StudentSubcommand::Withdraw { .. } | StudentSubcommand::Remove { .. }
        )
    }

    pub async fn run(&self, ctx: &AppContext) -> CommandResult {
        let vm = ctx.student();
        vm.ready().await?;

        match &self.command {
            StudentSubcommand::Add {
                admission_number,
                first_name,
                last_name,
                class,
                guardian,
                guardian_phone,
                dob,
            } => {
                let mut student = Student::new(
                    admission_number.trim(),
                    first_name.trim(),
                    last_name.trim(),
                    class.trim(),
                );
                if guardian.is_some() || guardian_phone.is_some() {
                    student = student.with_guardian(
                        guardian.as_deref().unwrap_or(""),
                        guardian_phone.as_deref().unwrap_or(""),
                    );
                }
                if let Some(dob) = dob {
                    student = student.with_date_of_birth(*dob);
                }
                let enrolled = vm.enroll_student(student).await?;
                println!("Enrolled student:");
                println!("{}", enrolled);
                println!("ID: {}", enrolled.id);
                Ok(())
            }

            StudentSubcommand::List { class, search, format } => {
                let students = match (class, search) {
                    (Some(class), _) => ctx.students.dao().list_by_class(class).await?,
                    (None, Some(query)) => vm.search_students(query),
                    (None, None) => ctx.students.list().await?,
                };

                if students.is_empty() {
                    println!("No students found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => print_json(&students),
                    OutputFormat::Text => {
                        println!(
                            "{:<36}  {:<12}  {:<26}  {:<8}  STATUS",
                            "ID", "ADMISSION", "NAME", "CLASS"
                        );
                        println!("{}", "-".repeat(100));
                        for student in &students {
                            println!(
                                "{:<36}  {:<12}  {:<26}  {:<8}  {}",
                                student.id,
                                truncate(&student.admission_number, 12),
                                truncate(&student.full_name(), 26),
                                truncate(&student.class_name, 8),
                                student.status
                            );
                        }
                        println!("\nTotal: {} student(s)", students.len());
                        Ok(())
                    }
                }
            }

            StudentSubcommand::Classes { format } => {
                let sizes = vm.class_sizes();
                match format {
                    OutputFormat::Json => print_json(&sizes),
                    OutputFormat::Text => {
                        if sizes.is_empty() {
                            println!("No active students");
                            return Ok(());
                        }
                        println!("{:<12}  STUDENTS", "CLASS");
                        for (class, count) in &sizes {
                            println!("{:<12}  {}", class, count);
                        }
                        Ok(())
                    }
                }
            }

            StudentSubcommand::Show { id, format } => {
                let student = vm
                    .students
                    .find(id)
                    .ok_or_else(|| format!("Student not found: {}", id))?;
                match format {
                    OutputFormat::Json => print_json(&student),
                    OutputFormat::Text => {
                        println!("{}", student);
                        Ok(())
                    }
                }
            }

            StudentSubcommand::Withdraw { id } => {
                let student = vm.withdraw_student(id).await?;
                println!("Withdrew {} from {}", student.full_name(), student.class_name);
                Ok(())
            }

            StudentSubcommand::Remove { id } => {
                vm.remove_student(id).await?;
                println!("Removed student: {}", id);
                Ok(())
            }
        }
    }
}
