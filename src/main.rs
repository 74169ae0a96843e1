//! Playmaker server binary: listens for agents until Ctrl-C.
//!
//! Usage:
//!   playmaker-server --rpc-port 50051 --log-dir debug/player_logs
//!
//! Unset options fall back to the `PLAYMAKER_*` environment variables.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use playmaker_server::configuration::Configuration;
use playmaker_server::logger::{init_logger, rotate_log_dir};
use playmaker_server::server::Server;

#[derive(Parser)]
#[command(name = "playmaker-server")]
#[command(about = "Decision server for simulated soccer agents")]
struct Args {
    /// Port agents connect to [default: 50051]
    #[arg(short = 'p', long)]
    rpc_port: Option<u16>,

    /// Address to listen on [default: 0.0.0.0]
    #[arg(long)]
    host: Option<IpAddr>,

    /// Directory for per-agent debug logs, rotated at startup if it exists
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// State file shared with other server processes for client ids
    #[arg(long)]
    counter_file: Option<PathBuf>,

    /// Also write the service log to a timestamped file
    #[arg(long)]
    log_file: bool,
}

impl Args {
    fn into_configuration(self, base: Configuration) -> Configuration {
        let mut config = base;
        if let Some(port) = self.rpc_port {
            config = config.with_rpc_port(port);
        }
        if let Some(host) = self.host {
            config = config.with_host(host);
        }
        if self.log_dir.is_some() {
            config = config.with_log_dir(self.log_dir);
        }
        if self.counter_file.is_some() {
            config = config.with_counter_file(self.counter_file);
        }
        if self.log_file {
            config = config.with_log_file(true);
        }
        config
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let (env_config, env_warnings) = Configuration::from_env_with_warnings();
    let config = args.into_configuration(env_config);

    // rotate first so a service log file lands in the fresh directory
    let rotated = match config.log_dir() {
        Some(dir) => rotate_log_dir(dir)?,
        None => None,
    };
    init_logger(&config)?;
    for warning in env_warnings {
        warn!("{warning}");
    }
    if let Some(previous) = rotated {
        info!("previous agent logs moved to {}", previous.display());
    }

    let handle = Server::new(config).start()?;
    let shutdown = handle.shutdown_signal();
    ctrlc::set_handler(move || {
        info!("interrupt received, shutting down");
        shutdown.trigger();
    })
    .context("could not install Ctrl-C handler")?;

    handle.wait();
    info!("server stopped");
    Ok(())
}
