//! couchctl CLI
//!
//! Command-line client for a cluster's administrative REST interface.
//!
//! # Commands
//! - `nodes` - List cluster members
//! - `info` - Show the node behind the admin URL
//! - `cluster` - Show the cluster identity
//! - `remove` - Eject nodes and wait for the rebalance to finish
//! - `wait-ready` - Wait for a node to answer its liveness probe
//! - `wait-healthy` - Wait for the node to join a cluster and settle
//! - `bucket-ready` - Check that a bucket is healthy on every node
//! - `bucket-delete` - Delete a bucket
//! - `memory-quota` - Set data/index memory quotas
//! - `config` - Show or edit configuration
//!
//! # Configuration
//! Config file: ~/.couchctl/config.toml

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use couchctl_core::{ClusterClient, Credentials, HttpConfig, HttpTransport, TlsConfig};
use couchctl_rebalancer::{ProbeConfig, Prober, Rebalancer, RemovalConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod commands;
mod config;
mod symbols;

use commands::{bucket, nodes, quota, remove, wait};

#[derive(Parser)]
#[command(name = "couchctl")]
#[command(about = "Cluster administration CLI")]
#[command(version)]
struct Cli {
    /// Admin URL of a cluster node (overrides config file)
    #[arg(long, global = true, env = "COUCHCTL_URL")]
    url: Option<String>,

    /// Admin username (overrides config file)
    #[arg(short, long, global = true, env = "COUCHCTL_USERNAME")]
    username: Option<String>,

    /// Admin password
    #[arg(short, long, global = true, env = "COUCHCTL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    // ===== TLS Configuration =====
    /// Path to CA certificate for verifying the cluster (PEM format)
    #[arg(long, global = true, env = "COUCHCTL_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// Skip server certificate verification (DANGEROUS - development only)
    #[arg(long, global = true, default_value = "false")]
    insecure: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cluster members
    Nodes {
        /// Print the raw node records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the node behind the admin URL
    Info,

    /// Show the cluster identity
    Cluster,

    /// Remove nodes from the cluster and wait for the rebalance
    Remove {
        /// Addresses of the nodes to remove (host or host:port)
        #[arg(required = true)]
        addrs: Vec<String>,

        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Wait until a node answers its liveness probe
    WaitReady {
        /// URL to probe
        #[arg(value_name = "URL")]
        target: String,

        /// Seconds to wait before giving up
        #[arg(long, default_value = "120")]
        timeout: u64,
    },

    /// Wait until the node has joined a cluster and reports healthy
    WaitHealthy {
        /// Seconds to wait before giving up
        #[arg(long, default_value = "300")]
        timeout: u64,
    },

    /// Check that a bucket is healthy on every node
    BucketReady {
        /// Bucket name
        name: String,
    },

    /// Delete a bucket
    BucketDelete {
        /// Bucket name
        name: String,

        /// Delete without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Set memory quotas in megabytes
    MemoryQuota {
        /// Data service quota
        #[arg(long)]
        data: Option<u64>,

        /// Index service quota
        #[arg(long)]
        index: Option<u64>,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (cluster.url, cluster.username)
        key: String,
        /// Value to set
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Config commands must work even when the configured URL is broken
    let command = match cli.command {
        Commands::Config { command } => return handle_config_command(command),
        other => other,
    };

    // Load configuration from ~/.couchctl/config.toml
    let cfg = config::load_config();

    // CLI args and env override config file
    let url = cli.url.unwrap_or(cfg.cluster.url);
    let username = cli.username.or(cfg.cluster.username);
    let credentials = match (username, cli.password) {
        (Some(user), Some(password)) => Some(Credentials::new(user, password)),
        (Some(user), None) => Some(Credentials::new(user, String::new())),
        (None, _) => None,
    };

    let tls = if cli.ca_cert.is_some() || cli.insecure {
        Some(TlsConfig {
            ca_cert: cli.ca_cert,
            danger_accept_invalid_certs: cli.insecure,
        })
    } else {
        None
    };

    let transport = HttpTransport::with_config(
        &url,
        credentials,
        HttpConfig {
            tls,
            ..HttpConfig::default()
        },
    )
    .with_context(|| format!("Invalid cluster URL: {}", url))?;
    let client = Arc::new(ClusterClient::new(url, Arc::new(transport)));

    match command {
        Commands::Nodes { json } => {
            nodes::run(&client, nodes::NodesConfig { json }).await?;
        }

        Commands::Info => {
            nodes::info(&client).await?;
        }

        Commands::Cluster => {
            nodes::cluster(&client).await?;
        }

        Commands::Remove { addrs, timeout } => {
            let rebalancer = Rebalancer::new(client, RemovalConfig::from_env()?);
            let config = remove::RemoveConfig {
                addrs,
                timeout: timeout.map(Duration::from_secs),
            };
            remove::run(&rebalancer, config).await?;
        }

        Commands::WaitReady { target, timeout } => {
            let prober = Prober::new(client, ProbeConfig::from_env()?);
            wait::ready(&prober, &target, Duration::from_secs(timeout)).await?;
        }

        Commands::WaitHealthy { timeout } => {
            let prober = Prober::new(client, ProbeConfig::from_env()?);
            wait::healthy(&prober, Duration::from_secs(timeout)).await?;
        }

        Commands::BucketReady { name } => {
            bucket::ready(&client, &name).await?;
        }

        Commands::BucketDelete { name, force } => {
            bucket::delete(&client, bucket::DeleteConfig { name, force }).await?;
        }

        Commands::MemoryQuota { data, index } => {
            quota::run(&client, quota::QuotaConfig { data, index }).await?;
        }

        Commands::Config { command } => {
            handle_config_command(command)?;
        }
    }

    Ok(())
}

/// Handle config subcommands
fn handle_config_command(command: Option<ConfigCommands>) -> Result<()> {
    use console::style;

    match command {
        None | Some(ConfigCommands::Show) => {
            let cfg = config::load_config();
            println!();
            println!("{}", style("couchctl Configuration").bold().underlined());
            println!("{}", style(symbols::HLINE).dim());
            println!("{}", style("[cluster]").cyan());
            println!("  url = \"{}\"", cfg.cluster.url);
            if let Some(username) = &cfg.cluster.username {
                println!("  username = \"{}\"", username);
            }
            println!();

            if let Ok(path) = config::config_file_path() {
                println!("{} {}", style("Config file:").dim(), path.display());
                if !path.exists() {
                    println!(
                        "{} Run '{}' to create it",
                        style("(not created yet)").yellow(),
                        style("couchctl config init").green()
                    );
                }
            }
        }

        Some(ConfigCommands::Path) => {
            if let Ok(path) = config::config_file_path() {
                println!("{}", path.display());
            }
        }

        Some(ConfigCommands::Init { force }) => {
            let path = config::config_file_path()?;
            if path.exists() && !force {
                println!(
                    "{} Config file already exists at {}",
                    style(symbols::WARN).yellow(),
                    path.display()
                );
                println!("Use --force to overwrite");
                return Ok(());
            }

            config::save_config(&config::CouchctlConfig::default())?;
            println!(
                "{} Config file created at {}",
                style(symbols::CHECK).green(),
                path.display()
            );
        }

        Some(ConfigCommands::Set { key, value }) => {
            let mut cfg = config::load_config();
            cfg.set(&key, value)?;
            config::save_config(&cfg)?;
            println!("{} Configuration updated", style(symbols::CHECK).green());
        }
    }

    Ok(())
}
