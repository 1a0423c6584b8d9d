//! pushlink - push-notification channel client
//!
//! Connects to a notification channel and prints every delivered message
//! as a JSON line on stdout.

use clap::{Parser, Subcommand};
use pushlink::{ConnectionManager, ConnectionStatus, Endpoint, ManagerConfig};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pushlink")]
#[command(about = "Push-notification channel client")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print incoming messages
    Listen {
        /// Session token appended to the endpoint path
        #[arg(long, env = "PUSHLINK_TOKEN", hide_env_values = true)]
        token: String,

        /// Path to config file
        #[arg(short, long, conflicts_with_all = ["host", "path", "secure"])]
        config: Option<PathBuf>,

        /// Server host, with optional port
        #[arg(long, default_value = "localhost:8080")]
        host: String,

        /// Channel path on the server
        #[arg(long, default_value = pushlink::config::DEFAULT_WS_PATH)]
        path: String,

        /// Use wss:// instead of ws://
        #[arg(long)]
        secure: bool,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "pushlink.toml")]
        output: PathBuf,

        /// Endpoint URL
        #[arg(long, default_value = "ws://localhost:8080/ws/messages")]
        endpoint: String,
    },

    /// Load and validate a config file
    CheckConfig {
        /// Path to config file
        #[arg(short, long, default_value = "pushlink.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::from_default_env().add_directive("pushlink=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    match cli.command {
        Commands::Listen {
            token,
            config,
            host,
            path,
            secure,
        } => {
            let config = match config {
                Some(path) => ManagerConfig::from_file(path)?,
                None => {
                    let endpoint = Endpoint::new(host).with_path(path).with_secure(secure);
                    ManagerConfig::new(endpoint.url())
                }
            };
            listen(config, token).await?;
        }

        Commands::InitConfig { output, endpoint } => {
            init_config(output, endpoint)?;
        }

        Commands::CheckConfig { config } => {
            check_config(config)?;
        }
    }

    Ok(())
}

async fn listen(config: ManagerConfig, token: String) -> anyhow::Result<()> {
    info!(endpoint = %config.endpoint_url, "starting pushlink");

    let manager = ConnectionManager::new(config)?;

    let _messages = manager.on_message(|message| match message.to_json() {
        Ok(line) => println!("{line}"),
        Err(e) => error!(error = %e, "failed to render message"),
    });

    let _statuses = manager.on_status_change(|status| match status {
        ConnectionStatus::Error => warn!(%status, "channel status"),
        _ => info!(%status, "channel status"),
    });

    manager.connect(token);

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    manager.disconnect();

    Ok(())
}

fn init_config(output: PathBuf, endpoint: String) -> anyhow::Result<()> {
    let config = ManagerConfig::new(endpoint);
    config.validate()?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, config.to_toml()?)?;

    println!("Config written to: {}", output.display());
    println!();
    println!("Edit the file to set your endpoint, then run:");
    println!("  pushlink listen --config {} --token <TOKEN>", output.display());

    Ok(())
}

fn check_config(path: PathBuf) -> anyhow::Result<()> {
    let config = ManagerConfig::from_file(&path)?;

    println!("Config OK: {}", path.display());
    println!("  endpoint:               {}", config.endpoint_url);
    println!("  reconnect_interval_ms:  {}", config.reconnect_interval_ms);
    println!("  max_reconnect_attempts: {}", config.max_reconnect_attempts);
    println!("  heartbeat_interval_ms:  {}", config.heartbeat_interval_ms);

    Ok(())
}
