use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use vici_common::config::{default_certs_dir, DEFAULT_SOCKET_PATH};
use vici_tunnel::{Manager, ManagerConfig, StartAction, TunnelConnectionConfig};

#[derive(Parser)]
#[command(name = "vici-tunnel")]
#[command(about = "Manage IPsec tunnel definitions in the IKE daemon")]
struct Args {
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Daemon control socket
    #[arg(long, env = "VICI_TUNNEL_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Directory for relative certificate filenames
    #[arg(long, env = "VICI_TUNNEL_CERTS_DIR")]
    certs_dir: Option<PathBuf>,

    /// Child SA start action (none, trap, start)
    #[arg(long, default_value = "trap")]
    start_action: StartAction,

    /// Give up on the daemon after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List loaded connection names
    List,
    /// Load a tunnel described by a JSON file
    Load {
        /// Path to the tunnel configuration
        file: PathBuf,
    },
    /// Unload a connection by name
    Unload {
        /// Connection name
        name: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ManagerConfig::new()
        .with_socket_path(&args.socket)
        .with_certs_path(args.certs_dir.unwrap_or_else(default_certs_dir))
        .with_start_action(args.start_action);
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let manager = Manager::new(config);
    info!("Using control socket {}", args.socket.display());

    match args.command {
        Commands::List => {
            let names = manager
                .list_conn_names()
                .context("Failed to list connections")?;
            for name in names {
                println!("{name}");
            }
        }

        Commands::Load { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read tunnel config from {:?}", file))?;
            let tunnel: TunnelConnectionConfig = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse tunnel config {:?}", file))?;

            manager
                .load_conn(&tunnel)
                .with_context(|| format!("Failed to load connection '{}'", tunnel.name))?;
            println!("Loaded {}", tunnel.name);
        }

        Commands::Unload { name } => {
            manager
                .unload_conn(&name)
                .with_context(|| format!("Failed to unload connection '{name}'"))?;
            println!("Unloaded {name}");
        }
    }

    Ok(())
}
