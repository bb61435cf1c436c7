//! rpglot-client - terminal client for a remote rpglot-web server.
//!
//! The server decides the mode: live servers push snapshots over SSE,
//! history servers are browsed by timestamp.
//!
//! Usage:
//!   rpglot-client --url http://db1:8080
//!   rpglot-client --url http://db1:8080 --token "$JWT"
//!   rpglot-client --at 'tab=pgl&timestamp=1738944000'

mod address_file;
mod app;
mod render;
#[cfg(test)]
mod testing;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use rpglot_client_core::address::NavAddress;
use rpglot_client_core::session::Credential;

use address_file::AddressFile;
use app::Config;

const LOG_FILE: &str = "rpglot-client.log";

/// Terminal client for rpglot-web.
#[derive(Parser)]
#[command(name = "rpglot-client", version, about = "Remote rpglot viewer")]
struct Args {
    /// Server base URL.
    #[arg(long, env = "RPGLOT_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Bearer token (SSO proxy JWT).
    #[arg(long, env = "RPGLOT_TOKEN", conflicts_with = "user")]
    token: Option<String>,

    /// Basic auth user.
    #[arg(long, env = "RPGLOT_AUTH_USER", requires = "password")]
    user: Option<String>,

    /// Basic auth password.
    #[arg(long, env = "RPGLOT_AUTH_PASSWORD", requires = "user")]
    password: Option<String>,

    /// Initial navigation address, e.g. `tab=pga&filter=idle`.
    /// Overrides the persisted one.
    #[arg(long, value_name = "ADDRESS")]
    at: Option<String>,

    /// File holding the navigation address between runs.
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// Directory for the log file.
    #[arg(long, env = "RPGLOT_CLIENT_LOG_DIR", default_value = "/tmp")]
    log_dir: PathBuf,

    /// History navigation debounce (milliseconds).
    #[arg(long, default_value_t = 50)]
    debounce_ms: u64,

    /// Delay before retrying a failed initial history load (milliseconds).
    #[arg(long, default_value_t = 2000)]
    retry_delay_ms: u64,

    /// Screen refresh interval without input (milliseconds).
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

impl Args {
    fn credential(&self) -> Option<Credential> {
        if let Some(token) = &self.token {
            return Some(Credential::Bearer(token.clone()));
        }
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => Some(Credential::Basic {
                user: user.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    fn config(self) -> Config {
        let credential = self.credential();
        let address_file = self
            .state_file
            .or_else(AddressFile::default_path)
            .map(AddressFile::new);
        Config {
            url: self.url,
            credential,
            seed: self.at.as_deref().map(NavAddress::decode),
            address_file,
            debounce: Duration::from_millis(self.debounce_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            tick_rate: Duration::from_millis(self.tick_ms),
        }
    }
}

/// Logs go to a file: the terminal belongs to the UI.
fn init_logging(log_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rpglot_client=info,rpglot_client_core=info".into()),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();
    guard
}

// ============================================================
// Main
// ============================================================

fn main() -> ExitCode {
    let args = Args::parse();
    // Dropped on return so buffered log lines are flushed.
    let _guard = init_logging(&args.log_dir);
    info!(
        version = rpglot_client_core::VERSION,
        url = %args.url,
        log = %args.log_dir.join(LOG_FILE).display(),
        "starting"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            eprintln!("Error: failed to build tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    exit_code(runtime.block_on(app::run(args.config())))
}

fn exit_code(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "client failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
