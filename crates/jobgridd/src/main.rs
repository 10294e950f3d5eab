//! jobgridd — the Jobgrid job manager daemon.
//!
//! Single binary that assembles the job manager:
//! - State store (redb)
//! - Matchmaking and policy manager clients
//! - Job, resource, policy, and job group services
//! - REST API
//!
//! # Usage
//!
//! ```text
//! jobgridd init-config > jobgrid.toml
//! jobgridd serve --config jobgrid.toml --port 8080
//! ```

mod daemon;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jobgrid_core::JobgridConfig;

#[derive(Parser)]
#[command(name = "jobgridd", about = "Jobgrid job manager daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the job manager API.
    Serve {
        /// Path to a jobgrid.toml; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long, env = "SERVER_PORT")]
        port: Option<u16>,

        /// Data directory for persistent state.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Base URL of the matchmaking service.
        #[arg(long, env = "MATCHMAKING_URL")]
        matchmaking_url: Option<String>,

        /// Base URL of the policy manager.
        #[arg(long, env = "POLICY_MANAGER_URL")]
        policy_manager_url: Option<String>,

        /// Lease duration for claimed jobs, in seconds.
        #[arg(long)]
        lease_secs: Option<u64>,

        /// Identity provider public key.
        #[arg(long, env = "KEYCLOAK_PUBLIC_KEY")]
        public_key: Option<String>,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },

    /// Print a starter jobgrid.toml.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
            matchmaking_url,
            policy_manager_url,
            lease_secs,
            public_key,
            log_json,
        } => {
            init_tracing(log_json);

            let mut cfg = match config {
                Some(path) => JobgridConfig::from_file(&path)?,
                None => JobgridConfig::default(),
            };
            if let Some(port) = port {
                cfg.server.port = port;
            }
            if let Some(dir) = data_dir {
                cfg.storage.data_dir = dir;
            }
            if let Some(url) = matchmaking_url {
                cfg.matchmaking.url = Some(url);
            }
            if let Some(url) = policy_manager_url {
                cfg.policy_manager.url = Some(url);
            }
            if let Some(secs) = lease_secs {
                cfg.lease.duration_secs = secs;
            }
            if let Some(key) = public_key {
                cfg.auth.public_key = Some(key);
            }
            cfg.validate()?;

            daemon::run(cfg).await
        }
        Command::InitConfig => {
            print!("{}", JobgridConfig::scaffold().to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,jobgrid=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
