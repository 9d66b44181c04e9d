// Obscura — Application Entry Point
//
// Parses CLI arguments, loads config, initializes structured logging (which
// never emits passwords or key material), and dispatches to the command
// handler. Log output goes to stderr so command output stays clean.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use obscura::cli::{execute, Cli};
use obscura::config::Config;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins; otherwise `log.debug` picks the default level.
    let default_filter = if config.log.debug {
        "obscura=debug"
    } else {
        "obscura=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute(cli, config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
