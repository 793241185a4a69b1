//! Rewriting reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser                        ┌──────────────────────────────────────────────┐
//!     GET /https://a.test/x.html ───▶│ http::server ─▶ routing ─▶ http::request     │
//!                                    │                               │              │
//!                                    │                               ▼              │
//!                                    │                         http::client ────────┼──▶ a.test
//!                                    │                               │              │
//!                                    │                               ▼              │
//!                                    │   rewrite::dispatch (headers, html, css)     │
//!     ◀──────────────────────────────┤   http::response                             │
//!                                    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use rewrite_proxy::config::{load_config, ProxyConfig};
use rewrite_proxy::lifecycle;

#[derive(Parser)]
#[command(name = "rewrite-proxy")]
#[command(about = "Reverse proxy that rewrites HTML, CSS and headers to stay on the proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Override rewrite.proxy_root
    #[arg(long)]
    root: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("rewrite-proxy: {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => ProxyConfig::default(),
    };

    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(root) = cli.root {
        config.rewrite.proxy_root = root;
    }
    if let Err(errors) = rewrite_proxy::config::validation::validate_config(&config) {
        for e in errors {
            eprintln!("rewrite-proxy: {}", e);
        }
        return ExitCode::FAILURE;
    }

    if cli.check {
        println!("configuration ok");
        return ExitCode::SUCCESS;
    }

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("rewrite-proxy: {}", e);
            ExitCode::FAILURE
        }
    }
}
