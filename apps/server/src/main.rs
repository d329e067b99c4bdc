//! # cardshop
//!
//! ```text
//! cardshop serve           HTTP server + background scheduler
//! cardshop sync            one sync, non-zero exit on failure (cron)
//! cardshop refresh-token   force an OAuth refresh
//! cardshop status          connection state and recent runs
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cardshop_ebay::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "cardshop", about = "eBay listing sync for the card shop", version)]
struct Cli {
    /// Path to configuration file (defaults to the per-user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
        /// Do not start the background sync scheduler
        #[arg(long)]
        no_scheduler: bool,
    },
    /// Run one sync now
    Sync,
    /// Refresh the eBay access token
    RefreshToken,
    /// Show connection state and recent sync runs
    Status {
        /// Number of runs to show
        #[arg(long, default_value = "5")]
        runs: u32,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cardshop=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.clone())?;

    match cli.command {
        Commands::Serve { port, no_scheduler } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            commands::serve::run(config, !no_scheduler).await?;
        }
        Commands::Sync => {
            commands::sync::run(config).await?;
        }
        Commands::RefreshToken => {
            commands::sync::refresh_token(config).await?;
        }
        Commands::Status { runs } => {
            commands::status::run(config, runs).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::parse_from(["cardshop", "serve"]);
        assert!(cli.config.is_none());
        match cli.command {
            Commands::Serve { port, no_scheduler } => {
                assert!(port.is_none());
                assert!(!no_scheduler);
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn test_parse_serve_custom() {
        let cli = Cli::parse_from([
            "cardshop",
            "serve",
            "--port",
            "9000",
            "--no-scheduler",
            "--config",
            "/etc/cardshop.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/cardshop.toml")));
        match cli.command {
            Commands::Serve { port, no_scheduler } => {
                assert_eq!(port, Some(9000));
                assert!(no_scheduler);
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn test_parse_one_shot_commands() {
        assert!(matches!(
            Cli::parse_from(["cardshop", "sync"]).command,
            Commands::Sync
        ));
        assert!(matches!(
            Cli::parse_from(["cardshop", "refresh-token"]).command,
            Commands::RefreshToken
        ));
        match Cli::parse_from(["cardshop", "status"]).command {
            Commands::Status { runs } => assert_eq!(runs, 5),
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["cardshop", "deploy"]).is_err());
    }
}
