use clap::{Args, Subcommand};

use super::{print_json, truncate, CommandResult, OutputFormat};
use school_erp::app::AppContext;
use school_erp::models::{Question, Quiz, QuizStatus};
use school_erp::viewmodel::UiState;

#[derive(Args)]
pub struct ExamCommand {
    #[command(subcommand)]
    pub command: ExamSubcommand,
}

#[derive(Subcommand)]
pub enum ExamSubcommand {
    /// Quizzes and their questions
    Quiz {
        #[command(subcommand)]
        command: QuizSubcommand,
    },
}

#[derive(Subcommand)]
pub enum QuizSubcommand {
    /// Create a draft quiz
    Create {
        title: String,

        #[arg(long)]
        subject: String,

        /// Class the quiz is for, e.g. JSS1
        #[arg(long)]
        class: String,

        /// Time limit in minutes
        #[arg(long)]
        duration: Option<i32>,
    },

    /// List quizzes
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<QuizStatus>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a quiz and its questions
    Show {
        /// Quiz ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a multiple-choice question to a draft quiz
    AddQuestion {
        /// Quiz ID
        quiz_id: String,

        #[arg(long)]
        prompt: String,

        /// Answer option (repeat for each option, in order)
        #[arg(long = "option", value_name = "TEXT", required = true)]
        options: Vec<String>,

        /// Number of the correct option, starting at 1
        #[arg(long)]
        correct: usize,

        #[arg(long, default_value_t = 1)]
        points: u32,
    },

    /// Publish a draft quiz
    Publish {
        /// Quiz ID
        id: String,
    },

    /// Close a published quiz
    Close {
        /// Quiz ID
        id: String,
    },

    /// Score a set of answers
    Grade {
        /// Quiz ID
        id: String,

        /// Chosen option per question, starting at 1; "-" for unanswered.
        /// Example: 2,1,-,4
        #[arg(value_delimiter = ',', value_parser = parse_answer, allow_hyphen_values = true)]
        answers: Vec<Option<usize>>,
    },

    /// Delete a quiz
    Delete {
        /// Quiz ID
        id: String,
    },
}

/// Answers are 1-based on the command line and 0-based in the model.
fn parse_answer(value: &str) -> Result<Option<usize>, String> {
    let value = value.trim();
    if value == "-" || value.is_empty() {
        return Ok(None);
    }
    match value.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(Some(n - 1)),
        _ => Err(format!("Invalid answer '{}'. Use an option number or '-'", value)),
    }
}

fn print_questions(questions: &[Question]) {
    for (i, question) in questions.iter().enumerate() {
        println!("{}. {} ({} pt)", i + 1, question.prompt, question.points);
        for (j, option) in question.options.iter().enumerate() {
            let marker = if j == question.correct_option { "*" } else { " " };
            println!("   {} {}) {}", marker, j + 1, option);
        }
    }
}

impl ExamCommand {
    /// True for subcommands that change records.
    pub fn writes(&self) -> bool {
        let ExamSubcommand::Quiz { command } = &self.command;
        !matches!(
            command,
            QuizSubcommand::List { .. } | QuizSubcommand::Show { .. } | QuizSubcommand::Grade { .. }
        )
    }

    pub async fn run(&self, ctx: &AppContext) -> CommandResult {
        let ExamSubcommand::Quiz { command } = &self.command;
        let vm = ctx.exam();
        vm.ready().await?;

        match command {
            QuizSubcommand::Create {
                title,
                subject,
                class,
                duration,
            } => {
                let mut quiz = Quiz::new(title.trim(), subject.trim(), class.trim());
                if let Some(duration) = duration {
                    quiz = quiz.with_duration(*duration);
                }
                let created = vm.create_quiz(quiz).await?;
                println!("Created quiz:");
                println!("{}", created);
                println!("ID: {}", created.id);
                Ok(())
            }

            QuizSubcommand::List { status, format } => {
                let quizzes = match status {
                    Some(status) => ctx.quizzes.dao().list_by_status(*status).await?,
                    None => ctx.quizzes.list().await?,
                };

                if quizzes.is_empty() {
                    println!("No quizzes found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => print_json(&quizzes),
                    OutputFormat::Text => {
                        println!(
                            "{:<36}  {:<28}  {:<14}  {:<8}  {:>9}  STATUS",
                            "ID", "TITLE", "SUBJECT", "CLASS", "QUESTIONS"
                        );
                        println!("{}", "-".repeat(114));
                        for quiz in &quizzes {
                            println!(
                                "{:<36}  {:<28}  {:<14}  {:<8}  {:>9}  {}",
                                quiz.id,
                                truncate(&quiz.title, 28),
                                truncate(&quiz.subject, 14),
                                truncate(&quiz.class_name, 8),
                                quiz.questions.len(),
                                quiz.status
                            );
                        }
                        println!("\nTotal: {} quiz(zes)", quizzes.len());
                        Ok(())
                    }
                }
            }

            QuizSubcommand::Show { id, format } => {
                let quiz = vm.quizzes.find(id).ok_or_else(|| format!("Quiz not found: {}", id))?;
                if let OutputFormat::Json = format {
                    return print_json(&quiz);
                }

                println!("{}", quiz);
                println!();
                match vm.questions_state(id)? {
                    UiState::Empty => println!("No questions yet"),
                    UiState::Success(questions) => print_questions(&questions),
                    UiState::Error(message) => return Err(message.into()),
                    UiState::Loading => println!("Loading..."),
                }
                Ok(())
            }

            QuizSubcommand::AddQuestion {
                quiz_id,
                prompt,
                options,
                correct,
                points,
            } => {
                if *correct == 0 {
                    return Err("Correct option numbers start at 1".into());
                }
                let question =
                    Question::new(prompt.trim(), options.clone(), correct - 1).with_points(*points);
                let quiz = vm.add_question(quiz_id, question).await?;
                println!(
                    "Added question {} to '{}' ({} points total)",
                    quiz.questions.len(),
                    quiz.title,
                    quiz.total_points()
                );
                Ok(())
            }

            QuizSubcommand::Publish { id } => {
                let quiz = vm.publish_quiz(id).await?;
                println!("Published quiz: {}", quiz.title);
                Ok(())
            }

            QuizSubcommand::Close { id } => {
                let quiz = vm.close_quiz(id).await?;
                println!("Closed quiz: {}", quiz.title);
                Ok(())
            }

            QuizSubcommand::Grade { id, answers } => {
                let score = vm.grade(id, answers).await?;
                println!(
                    "Score: {}/{} ({:.1}%)",
                    score.earned, score.possible, score.percentage
                );
                Ok(())
            }

            QuizSubcommand::Delete { id } => {
                vm.delete_quiz(id).await?;
                println!("Deleted quiz: {}", id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("1"), Ok(Some(0)));
        assert_eq!(parse_answer(" 4 "), Ok(Some(3)));
        assert_eq!(parse_answer("-"), Ok(None));
        assert!(parse_answer("0").is_err());
        assert!(parse_answer("b").is_err());
    }
}
