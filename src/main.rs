use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    ConfigCommand, ExamCommand, FinanceCommand, HrCommand, InventoryCommand, StudentCommand,
    SyncCommand, TeacherCommand,
};
use school_erp::app::AppContext;
use school_erp::config::Config;

#[derive(Parser)]
#[command(name = "erp")]
#[command(version)]
#[command(about = "Offline-first school ERP", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Transactions, invoices and budgets
    Finance(FinanceCommand),

    /// Employees and leave
    Hr(HrCommand),

    /// Products and vendors
    Inventory(InventoryCommand),

    /// Quizzes
    Exam(ExamCommand),

    /// Student records
    Student(StudentCommand),

    /// Teaching staff
    Teacher(TeacherCommand),

    /// Push queued changes and pull from the server
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

impl Commands {
    fn writes(&self) -> bool {
        match self {
            Commands::Finance(cmd) => cmd.writes(),
            Commands::Hr(cmd) => cmd.writes(),
            Commands::Inventory(cmd) => cmd.writes(),
            Commands::Exam(cmd) => cmd.writes(),
            Commands::Student(cmd) => cmd.writes(),
            Commands::Teacher(cmd) => cmd.writes(),
            Commands::Sync(_) | Commands::Config(_) => false,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    let Some(command) = cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    if let Commands::Config(cmd) = &command {
        return cmd.run(&config);
    }

    let ctx = AppContext::open(&config.database_path.value).await?;
    match &command {
        Commands::Finance(cmd) => cmd.run(&ctx).await?,
        Commands::Hr(cmd) => cmd.run(&ctx, &config).await?,
        Commands::Inventory(cmd) => cmd.run(&ctx).await?,
        Commands::Exam(cmd) => cmd.run(&ctx).await?,
        Commands::Student(cmd) => cmd.run(&ctx).await?,
        Commands::Teacher(cmd) => cmd.run(&ctx).await?,
        Commands::Sync(cmd) => cmd.run(&ctx, &config).await?,
        Commands::Config(_) => {}
    }

    if command.writes() {
        commands::auto_sync(&ctx, &config).await;
    }

    Ok(())
}
