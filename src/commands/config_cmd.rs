use clap::{Args, Subcommand};

use super::{print_json, CommandResult, OutputFormat};
use school_erp::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Keeps the first few characters of a secret.
fn mask(secret: &str) -> String {
    format!("{}...", secret.chars().take(4).collect::<String>())
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> CommandResult {
        match &self.command {
            ConfigSubcommand::Show { format } => match format {
                OutputFormat::Json => {
                    let mut shown = config.clone();
                    shown.sync.api_key = shown.sync.api_key.as_deref().map(mask);
                    print_json(&shown)
                }
                OutputFormat::Text => {
                    println!("Configuration");
                    println!("=============\n");

                    if let Some(path) = &config.config_file {
                        println!("Config file: {}", path.display());
                    } else {
                        println!(
                            "Config file: {} (not found)",
                            Config::default_config_path().display()
                        );
                    }
                    println!();

                    println!("database_path: {}", config.database_path.value.display());
                    println!("  source: {}", config.database_path.source);
                    println!();

                    println!("operator: {}", config.operator.value);
                    println!("  source: {}", config.operator.source);
                    println!();

                    let sync = &config.sync;
                    println!("sync:");
                    println!("  server_url:    {}", sync.server_url.as_deref().unwrap_or("(not set)"));
                    println!(
                        "  api_key:       {}",
                        sync.api_key.as_deref().map(mask).unwrap_or_else(|| "(not set)".to_string())
                    );
                    println!("  auto_sync:     {}", sync.auto_sync);
                    println!("  retry_base_ms: {}", sync.retry_base_ms);
                    println!("  retry_max_ms:  {}", sync.retry_max_ms);
                    println!("  interval_secs: {}", sync.interval_secs);
                    Ok(())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_keeps_prefix() {
        assert_eq!(mask("sk-live-123456"), "sk-l...");
        assert_eq!(mask("ab"), "ab...");
    }
}
