//! vmate - probe .ovpn configs and hold a self-healing connection

mod commands;
mod config;
mod logging;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use vmate_core::application::constants::{
    DEFAULT_ESTABLISH_TIMEOUT, DEFAULT_MAX_WORKERS, DEFAULT_PROBE_TIMEOUT, DEFAULT_SUCCESS_LIMIT,
};
use vmate_core::domain::DEFAULT_CLIENT_BINARY;

use crate::commands::Globals;
use crate::config::{
    expand_path, ConnectSettings, ProbeSettings, DEFAULT_CONFIG_DIR, DEFAULT_HISTORY_PATH,
};

#[derive(Parser)]
#[command(name = "vmate")]
#[command(about = "VPN config tester and failover connector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// History file of working configs
    #[arg(
        long,
        global = true,
        env = "VMATE_HISTORY",
        default_value = DEFAULT_HISTORY_PATH
    )]
    history: String,

    /// openvpn executable
    #[arg(
        long,
        global = true,
        env = "VMATE_OPENVPN_BIN",
        default_value = DEFAULT_CLIENT_BINARY
    )]
    openvpn_bin: String,

    /// ipinfo.io token for location lookups
    #[arg(
        long,
        global = true,
        env = "VMATE_IPINFO_TOKEN",
        hide_env_values = true
    )]
    ipinfo_token: Option<String>,

    /// Echo client output and per-config results
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Test every .ovpn config under a directory and save the working ones
    Probe {
        /// Directory searched recursively for configs
        #[arg(short, long, env = "VMATE_DIR", default_value = DEFAULT_CONFIG_DIR)]
        dir: String,

        /// Stop once this many configs work
        #[arg(short, long, default_value_t = DEFAULT_SUCCESS_LIMIT)]
        limit: usize,

        /// Seconds given to each config
        #[arg(short, long, default_value_t = DEFAULT_PROBE_TIMEOUT.as_secs())]
        timeout: u64,

        /// Maximum concurrent openvpn processes
        #[arg(short, long, default_value_t = DEFAULT_MAX_WORKERS)]
        max: usize,

        /// Replace the legacy `cipher AES-128-CBC` directive before testing
        #[arg(long)]
        modify: bool,
    },

    /// Connect to a config and fail over through the history when it drops
    Connect {
        /// Config to start with
        path: String,

        /// Seconds allowed for the tunnel to come up
        #[arg(long, default_value_t = DEFAULT_ESTABLISH_TIMEOUT.as_secs())]
        establish_timeout: u64,
    },

    /// List the saved working configs
    Recent,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose)?;

    info!(version = vmate_core::VERSION, "vmate starting");

    let globals = Globals {
        history: expand_path(&cli.history),
        ipinfo_token: cli.ipinfo_token,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Probe {
            dir,
            limit,
            timeout,
            max,
            modify,
        } => {
            let settings = ProbeSettings::new(&dir, limit, timeout, max, modify, &cli.openvpn_bin)?;
            commands::warn_if_unprivileged();

            let cancel = CancellationToken::new();
            commands::cancel_on_ctrl_c(cancel.clone());
            commands::run_probe(settings, &globals, cancel).await?;
        }

        Commands::Connect {
            path,
            establish_timeout,
        } => {
            let settings = ConnectSettings::new(&path, establish_timeout, &cli.openvpn_bin)?;
            commands::warn_if_unprivileged();

            let cancel = CancellationToken::new();
            commands::cancel_on_ctrl_c(cancel.clone());
            commands::run_connect(settings, &globals, cancel).await?;
        }

        Commands::Recent => {
            commands::run_recent(&globals.history).await?;
        }
    }

    Ok(())
}
