//! pvegate CLI — Proxmox guest tools for agents.
//!
//! `pvegate serve` speaks line-delimited JSON-RPC on stdin/stdout.
//! `pvegate call` runs a single tool from the shell.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use pvegate_core::config::{ConnectionConfig, DEFAULT_BASE_URL, GatewayConfig};
use pvegate_hub::{Gateway, McpServer};

// ─── CLI Definition ────────────────────────────────────────

/// pvegate — inspect and control Proxmox guests from an agent
#[derive(Parser)]
#[command(name = "pvegate", version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/pvegate/config.toml)
    #[arg(short, long, global = true, env = "PVEGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Management API base URL (overrides config and PVE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// API token sent as the Authorization header (overrides config and PVE_API_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Default node for tool calls that omit one
    #[arg(long, global = true)]
    node: Option<String>,

    /// Verify the server's TLS certificate
    #[arg(long, global = true)]
    verify_tls: bool,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the tools over stdio (JSON-RPC, one message per line)
    Serve,

    /// Run one tool and print its result
    Call {
        /// Tool name, e.g. get_resource_health
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },

    /// List available tools
    Tools,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration (token redacted)
    Show,

    /// Write a template config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout belongs to the JSON-RPC channel
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pvegate_core=debug,pvegate_hub=debug"));
    let _guard = match &cli.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log dir {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "pvegate.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    };

    let config_path = cli.config.clone().unwrap_or_else(GatewayConfig::default_path);

    match &cli.command {
        None | Some(Commands::Serve) => {
            let gateway = Gateway::new(load_connection(&cli, &config_path)?)?;
            McpServer::new(gateway).run().await?;
        }
        Some(Commands::Call { tool, args }) => {
            let args: serde_json::Value =
                serde_json::from_str(args).context("Tool arguments must be a JSON object")?;
            let gateway = Gateway::new(load_connection(&cli, &config_path)?)?;

            let result = gateway.invoke(tool, args).await;
            if result.is_error {
                eprintln!("{} {}", "✗".red().bold(), result.text);
                std::process::exit(1);
            }
            println!("{}", result.text);
        }
        Some(Commands::Tools) => {
            let gateway = Gateway::new(load_connection(&cli, &config_path)?)?;
            println!("{}", "Available tools:".bold());
            for def in gateway.definitions() {
                println!("  {} — {}", def.name.cyan().bold(), def.description.dimmed());
            }
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => show_config(&cli, &config_path)?,
            ConfigAction::Init { force } => init_config(&config_path, *force)?,
        },
    }

    Ok(())
}

/// File, then environment, then command-line flags.
fn load_config(cli: &Cli, path: &Path) -> anyhow::Result<GatewayConfig> {
    let mut config = GatewayConfig::load(path)?;
    config.apply_env()?;

    if let Some(url) = &cli.api_url {
        config.api.base_url = Some(url.clone());
    }
    if let Some(token) = &cli.token {
        config.api.token = Some(token.clone());
    }
    if let Some(node) = &cli.node {
        config.api.default_node = node.clone();
    }
    if cli.verify_tls {
        config.api.verify_tls = true;
    }
    Ok(config)
}

fn load_connection(cli: &Cli, path: &Path) -> anyhow::Result<ConnectionConfig> {
    let connection = load_config(cli, path)?.connection()?;
    tracing::info!("Using {:?}", connection);
    Ok(connection)
}

fn show_config(cli: &Cli, path: &Path) -> anyhow::Result<()> {
    let config = load_config(cli, path)?;
    let connection = config.connection()?;

    println!("{} {}", "Config file:".bold(), path.display());
    println!("  base_url     {}", connection.base_url.cyan());
    println!(
        "  token        {}",
        if connection.auth_token.is_some() {
            "set (redacted)".green()
        } else {
            "not set".red()
        }
    );
    println!(
        "  verify_tls   {}",
        if connection.verify_tls {
            "true".green()
        } else {
            "false (self-signed certificates accepted)".yellow()
        }
    );
    println!("  default_node {}", connection.default_node.cyan());
    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let mut config = GatewayConfig::default();
    config.api.base_url = Some(DEFAULT_BASE_URL.to_string());
    config.save(path)?;

    println!("{} Wrote {}", "✓".green().bold(), path.display());
    println!("  Set the token with PVE_API_TOKEN or the [api] token key.");
    Ok(())
}
