use std::time::Duration;

use anyhow::{Context, Result};
use vici_tunnel::{Manager, ManagerConfig, StartAction, TunnelConnectionConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== Tunnel Manager Basic Example ===");

    let socket_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| vici_common::DEFAULT_SOCKET_PATH.to_string());

    let manager = Manager::new(
        ManagerConfig::new()
            .with_socket_path(&socket_path)
            .with_start_action(StartAction::Trap)
            .with_timeout(Duration::from_secs(5)),
    );

    println!("\n1. Loading connection 'example'...");
    let tunnel = TunnelConnectionConfig {
        name: "example".to_string(),
        local_addresses: vec!["192.0.2.1".to_string()],
        remote_addresses: vec!["198.51.100.7".to_string()],
        local_id: "CN=example-local".to_string(),
        remote_id: "CN=example-remote".to_string(),
        local_subnets: vec!["10.10.0.0/24".to_string()],
        remote_subnets: vec!["10.20.0.0/24".to_string()],
        if_id_in: Some(42),
        if_id_out: Some(42),
        ..Default::default()
    };
    manager
        .load_conn(&tunnel)
        .context("Failed to load connection")?;

    println!("\n2. Listing connections...");
    for name in manager.list_conn_names().context("Failed to list connections")? {
        println!("  - {name}");
    }

    println!("\n3. Unloading connection 'example'...");
    manager
        .unload_conn("example")
        .context("Failed to unload connection")?;

    println!("\n✓ Example completed");
    Ok(())
}
