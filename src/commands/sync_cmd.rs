//! Sync CLI commands for exchanging changes with the document server.

use clap::{Args, Subcommand};
use std::sync::Arc;

use school_erp::app::AppContext;
use school_erp::config::Config;
use school_erp::sync::{DocumentClient, RemoteError, SyncError};

/// Sync with remote server
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration, queued changes and server status
    Status,

    /// Requeue changes the server rejected
    RetryFailed,
}

impl SyncCommand {
    pub async fn run(&self, ctx: &AppContext, config: &Config) -> Result<(), SyncCommandError> {
        match &self.command {
            None => self.sync(ctx, config).await,
            Some(SyncSubcommand::Status) => self.status(ctx, config).await,
            Some(SyncSubcommand::RetryFailed) => self.retry_failed(ctx).await,
        }
    }

    async fn sync(&self, ctx: &AppContext, config: &Config) -> Result<(), SyncCommandError> {
        let client = DocumentClient::from_config(&config.sync)?;
        let worker = ctx.sync_worker(Arc::new(client), &config.sync);

        println!("Syncing with server...");
        println!();

        let report = worker.sync_once().await?;

        println!("  pushed {} change(s)", report.push.pushed);
        if report.push.dead_lettered > 0 {
            println!(
                "  ✗ {} change(s) rejected by the server (see `erp sync status`)",
                report.push.dead_lettered
            );
        }
        if let Some(reason) = &report.push.interrupted {
            println!("  ✗ push stopped early: {}", reason);
            println!("    remaining changes stay queued for the next sync");
        }
        for (collection, stats) in &report.pull.collections {
            let mut line = format!(
                "  ✓ {:<15} {} updated, {} removed",
                collection.path(),
                stats.upserted,
                stats.removed
            );
            if stats.protected > 0 {
                line.push_str(&format!(", {} kept (local changes pending)", stats.protected));
            }
            if stats.skipped > 0 {
                line.push_str(&format!(", {} unreadable", stats.skipped));
            }
            println!("{}", line);
        }

        println!();
        if report.is_interrupted() {
            println!("Sync incomplete.");
        } else {
            println!("Sync complete.");
        }
        Ok(())
    }

    async fn status(&self, ctx: &AppContext, config: &Config) -> Result<(), SyncCommandError> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        let pending = ctx.outbox.pending_count().await?;
        let failed = ctx.outbox.failed().await?;

        let (Some(server_url), Some(api_key)) = (&config.sync.server_url, &config.sync.api_key) else {
            println!("Status: Not configured");
            println!("Queued changes: {}", pending);
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  sync:");
            println!("    server_url: \"http://localhost:8080\"");
            println!("    api_key: \"your-api-key\"");
            println!("    auto_sync: false");
            println!();
            println!("Or set environment variables:");
            println!("  ERP_SYNC_URL");
            println!("  ERP_SYNC_API_KEY");
            return Ok(());
        };

        println!("Server:    {}", server_url);
        println!("API Key:   {}...", api_key.chars().take(8).collect::<String>());
        println!(
            "Auto-sync: {}",
            if config.sync.auto_sync {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!();
        println!("Queued changes:   {}", pending);
        println!("Rejected changes: {}", failed.len());
        for entry in &failed {
            println!(
                "  #{} {} {}/{}: {}",
                entry.seq,
                entry.operation,
                entry.collection,
                entry.document_id,
                entry.last_error.as_deref().unwrap_or("unknown error")
            );
        }
        println!();

        print!("Server status: ");
        let client = DocumentClient::from_config(&config.sync)?;
        match client.check_health().await {
            Ok(health) => {
                println!("✓ {} (version {})", health.status, health.version);
                match client.whoami().await {
                    Ok(identity) => println!("Organization:  {}", identity.org_id),
                    Err(RemoteError::Http { status: 401, .. }) => println!("Organization:  ✗ API key rejected"),
                    Err(e) => println!("Organization:  ✗ {}", e),
                }
            }
            Err(RemoteError::Connection(_)) => println!("✗ unreachable"),
            Err(e) => println!("✗ error: {}", e),
        }

        Ok(())
    }

    async fn retry_failed(&self, ctx: &AppContext) -> Result<(), SyncCommandError> {
        let requeued = ctx.outbox.retry_failed().await?;
        if requeued == 0 {
            println!("No rejected changes to retry.");
        } else {
            println!("Requeued {} change(s); they will be pushed on the next sync.", requeued);
        }
        Ok(())
    }
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    Remote(RemoteError),
    Sync(SyncError),
    Database(sqlx::Error),
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::Remote(e) => write!(f, "{}", e),
            SyncCommandError::Sync(e) => write!(f, "{}", e),
            SyncCommandError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::Remote(e) => Some(e),
            SyncCommandError::Sync(e) => Some(e),
            SyncCommandError::Database(e) => Some(e),
        }
    }
}

impl From<RemoteError> for SyncCommandError {
    fn from(e: RemoteError) -> Self {
        SyncCommandError::Remote(e)
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::Sync(e)
    }
}

impl From<sqlx::Error> for SyncCommandError {
    fn from(e: sqlx::Error) -> Self {
        SyncCommandError::Database(e)
    }
}
