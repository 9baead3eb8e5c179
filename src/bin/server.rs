//! Echo server CLI: `echoplex-server [PORT]` (default port 8000)

use std::env;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use echoplex::{Config, EchoServer};

const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = match env::args().nth(1) {
        Some(arg) => match arg.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                eprintln!("usage: echoplex-server [PORT]");
                return ExitCode::FAILURE;
            }
        },
        None => DEFAULT_PORT,
    };

    let server = match EchoServer::bind(("0.0.0.0", port), Config::default()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, port, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = server.run() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "server shut down with an error");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            ExitCode::SUCCESS
        }
    }
}
