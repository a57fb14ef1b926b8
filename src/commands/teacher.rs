use clap::{Args, Subcommand};

use super::{print_json, truncate, CommandResult, OutputFormat};
use school_erp::app::AppContext;
use school_erp::models::Teacher;

#[derive(Args)]
pub struct TeacherCommand {
    #[command(subcommand)]
    pub command: TeacherSubcommand,
}

#[derive(Subcommand)]
pub enum TeacherSubcommand {
    /// Add a teacher
    Add {
        first_name: String,

        last_name: String,

        #[arg(long)]
        email: Option<String>,

        /// Subject taught (can be repeated)
        #[arg(long = "subject", value_name = "SUBJECT")]
        subjects: Vec<String>,

        /// Linked HR employee ID
        #[arg(long)]
        employee: Option<String>,
    },

    /// List teachers
    List {
        /// Only teachers of this subject
        #[arg(long)]
        subject: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Remove a teacher
    Remove {
        /// Teacher ID
        id: String,
    },
}

impl TeacherCommand {
    /// True for subcommands that change records.
    pub fn writes(&self) -> bool {
        !matches!(self.command, TeacherSubcommand::List { .. })
    }

    pub async fn run(&self, ctx: &AppContext) -> CommandResult {
        let vm = ctx.teacher();
        vm.ready().await?;

        match &self.command {
            TeacherSubcommand::Add {
                first_name,
                last_name,
                email,
                subjects,
                employee,
            } => {
                let mut teacher = Teacher::new(first_name.trim(), last_name.trim()).with_subjects(subjects.clone());
                if let Some(email) = email {
                    teacher = teacher.with_email(email);
                }
                if let Some(employee) = employee {
                    teacher = teacher.with_employee(employee);
                }
                let created = vm.add_teacher(teacher).await?;
                if created.employee_id.is_some() && vm.employee_record(&created.id).await?.is_none() {
                    tracing::warn!(teacher = %created.id, "linked employee record does not exist");
                }
                println!("Added teacher: {} ({})", created.full_name(), created.id);
                Ok(())
            }

            TeacherSubcommand::List { subject, format } => {
                let teachers = match subject {
                    Some(subject) => vm.teachers_for_subject(subject),
                    None => vm.teachers.items(),
                };

                if teachers.is_empty() {
                    println!("No teachers found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => print_json(&teachers),
                    OutputFormat::Text => {
                        println!("{:<36}  {:<24}  {:<30}  POSITION", "ID", "NAME", "SUBJECTS");
                        println!("{}", "-".repeat(110));
                        for teacher in &teachers {
                            let position = vm
                                .employee_record(&teacher.id)
                                .await?
                                .map(|e| e.position)
                                .unwrap_or_default();
                            println!(
                                "{:<36}  {:<24}  {:<30}  {}",
                                teacher.id,
                                truncate(&teacher.full_name(), 24),
                                truncate(&teacher.subjects.join(", "), 30),
                                position
                            );
                        }
                        println!("\nTotal: {} teacher(s)", teachers.len());
                        Ok(())
                    }
                }
            }

            TeacherSubcommand::Remove { id } => {
                vm.remove_teacher(id).await?;
                println!("Removed teacher: {}", id);
                Ok(())
            }
        }
    }
}
