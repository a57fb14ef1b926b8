mod config_cmd;
mod exam;
mod finance;
mod hr;
mod inventory;
mod student;
mod sync_cmd;
mod teacher;

pub use config_cmd::ConfigCommand;
pub use exam::ExamCommand;
pub use finance::FinanceCommand;
pub use hr::HrCommand;
pub use inventory::InventoryCommand;
pub use student::StudentCommand;
pub use sync_cmd::SyncCommand;
pub use teacher::TeacherCommand;

use clap::ValueEnum;
use serde::Serialize;
use std::sync::Arc;

use school_erp::app::AppContext;
use school_erp::config::Config;
use school_erp::sync::DocumentClient;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Shortens `text` to `width` characters, ending with "..." when cut.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// One push and pull after a write, when `sync.auto_sync` is on. Failures
/// are logged; the write already succeeded locally.
pub async fn auto_sync(ctx: &AppContext, config: &Config) {
    if !config.sync.auto_sync || !config.sync.is_configured() {
        return;
    }
    let client = match DocumentClient::from_config(&config.sync) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("auto-sync skipped: {}", e);
            return;
        }
    };
    let worker = ctx.sync_worker(Arc::new(client), &config.sync);
    match worker.sync_once().await {
        Ok(report) => {
            if let Some(reason) = &report.push.interrupted {
                tracing::warn!("auto-sync stopped early, changes stay queued: {}", reason);
            } else {
                tracing::debug!(pushed = report.push.pushed, pulled = report.pull.upserted(), "auto-sync done");
            }
        }
        Err(e) => tracing::warn!("auto-sync failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Chalk", 10), "Chalk");
        assert_eq!(truncate("Exercise books, ruled", 10), "Exercis...");
        assert_eq!(truncate("Ọ̀jọ́ Àjàyí Adébáyọ̀", 8).chars().count(), 8);
    }
}
