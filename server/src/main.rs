use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use vici_responder::Responder;

#[derive(Parser)]
#[command(name = "vici-responder")]
#[command(about = "In-memory stand-in for the IKE daemon's control socket")]
struct Args {
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Socket path to listen on
    #[arg(short, long, default_value = "/tmp/charon.vici")]
    socket: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    info!("Starting control-socket responder...");

    let responder = Responder::bind(&args.socket).context("Failed to create responder")?;

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    responder
        .run_with_shutdown(running)
        .context("Responder error")?;

    info!("Responder stopped");
    Ok(())
}
