//! Command line entry point for facility settings

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facility_settings::config::Config;
use facility_settings::{ScopeContext, SettingsModule, SettingsScope};
use sea_orm::Database;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "facility-settings", version, about = "Layered facility settings")]
struct Cli {
    /// Database connection URL
    #[arg(long, default_value = "sqlite://facility-settings.db?mode=rwc")]
    database_url: String,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the effective value of a key
    Get {
        /// Dotted key, empty for the whole tree
        #[arg(default_value = "")]
        key: String,
        #[arg(long)]
        facility: Option<String>,
    },
    /// Print the value stored at a key in one scope
    Scoped {
        #[arg(default_value = "")]
        key: String,
        #[arg(long, default_value = "global")]
        scope: SettingsScope,
        #[arg(long)]
        facility: Option<String>,
    },
    /// Store a value; parsed as JSON, or taken as a plain string
    Set {
        key: String,
        value: String,
        #[arg(long, default_value = "global")]
        scope: SettingsScope,
        #[arg(long)]
        facility: Option<String>,
    },
    /// Remove the subtree at a key
    Delete {
        key: String,
        #[arg(long, default_value = "global")]
        scope: SettingsScope,
        #[arg(long)]
        facility: Option<String>,
    },
    /// Load a JSON or YAML settings file under a key
    Load {
        file: PathBuf,
        /// Key the file is stored under, empty for the root
        #[arg(long, default_value = "")]
        key: String,
        #[arg(long, default_value = "global")]
        scope: SettingsScope,
        #[arg(long)]
        facility: Option<String>,
        /// Print the rows that would be written without writing them
        #[arg(long)]
        preview: bool,
    },
    /// Remove soft-deleted rows older than the retention period
    Purge,
    /// Serve the REST API
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let db = Database::connect(cli.database_url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", cli.database_url))?;
    let module = Arc::new(SettingsModule::init(config, db).await?);
    let client = module.client();

    match cli.command {
        Command::Get { key, facility } => {
            let context = ScopeContext {
                facility_id: non_empty(&facility).map(str::to_string),
                country_time_zone: module.config().country_time_zone.clone(),
            };
            print_value(&key, client.get(&key, &context).await?)?;
        }
        Command::Scoped {
            key,
            scope,
            facility,
        } => {
            print_value(&key, client.get_scoped(&key, scope, non_empty(&facility)).await?)?;
        }
        Command::Set {
            key,
            value,
            scope,
            facility,
        } => {
            let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            let records = client.set(&key, value, scope, non_empty(&facility)).await?;
            for record in records {
                println!("{} = {}", display_key(&record.key), record.value);
            }
        }
        Command::Delete {
            key,
            scope,
            facility,
        } => {
            let deleted = client.delete(&key, scope, non_empty(&facility)).await?;
            println!("deleted {} row(s)", deleted);
        }
        Command::Load {
            file,
            key,
            scope,
            facility,
            preview,
        } => {
            let outcome = module
                .store()
                .load_file(&key, &file, scope, non_empty(&facility), preview)
                .await?;
            if outcome.preview {
                println!("preview, nothing written:");
            }
            for (row_key, value) in outcome.rows {
                println!("{} = {}", display_key(&row_key), value);
            }
        }
        Command::Purge => {
            let purged = module.purge_deleted().await?;
            println!("purged {} row(s)", purged);
        }
        Command::Serve => {
            let listener = tokio::net::TcpListener::bind(&module.config().bind_addr)
                .await
                .with_context(|| format!("failed to bind {}", module.config().bind_addr))?;
            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown requested");
                }
                shutdown.cancel();
            });
            module.serve(listener, cancel).await?;
        }
    }

    Ok(())
}

fn print_value(key: &str, value: Option<serde_json::Value>) -> Result<()> {
    match value {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("{} is not set", display_key(key)),
    }
    Ok(())
}

/// `--facility ""` means no facility, as in the REST API
fn non_empty(facility: &Option<String>) -> Option<&str> {
    facility.as_deref().filter(|f| !f.is_empty())
}

fn display_key(key: &str) -> &str {
    if key.is_empty() {
        "<root>"
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_facility_flag_means_no_facility() {
        let cli = Cli::try_parse_from(["facility-settings", "get", "timezone", "--facility", ""]).unwrap();
        let Command::Get { facility, .. } = cli.command else {
            panic!("expected get command");
        };
        assert_eq!(facility.as_deref(), Some(""));
        assert_eq!(non_empty(&facility), None);

        assert_eq!(non_empty(&Some("facility-a".to_string())), Some("facility-a"));
        assert_eq!(non_empty(&None), None);
    }
}
