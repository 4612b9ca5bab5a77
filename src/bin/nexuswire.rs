use clap::Parser;
use nexuswire::config::{CliOverrides, ServerConfig};
use nexuswire::server::Server;
use nexuswire::storage::MemoryGateway;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "nexuswire", version, about = "Wire-protocol document server with an in-memory store", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). Defaults to NEXUSWIRE_CONFIG or ./nexuswire.toml.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Address to listen on, e.g. 127.0.0.1:27017")]
    listen_addr: Option<String>,
    #[arg(long, help = "Log level: error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[arg(long, help = "Directory for rolling log files")]
    log_dir: Option<PathBuf>,
}

impl From<Cli> for CliOverrides {
    fn from(cli: Cli) -> Self {
        Self { config: cli.config, listen_addr: cli.listen_addr, log_level: cli.log_level, log_dir: cli.log_dir }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let overrides = CliOverrides::from(Cli::parse());
    let cfg = match ServerConfig::load(&overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("nexuswire: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = nexuswire::logger::configure_logging(
        cfg.log_dir.as_deref(),
        cfg.log_level.as_deref(),
        cfg.log_retention,
    ) {
        eprintln!("nexuswire: logging disabled: {e}");
    }

    let gateway = Arc::new(MemoryGateway::new());
    let server = match Server::bind(cfg.listen_addr.as_str(), gateway, cfg.max_message_size).await {
        Ok(server) => server,
        Err(e) => {
            log::error!("cannot listen on {}: {e}", cfg.listen_addr);
            eprintln!("nexuswire: cannot listen on {}: {e}", cfg.listen_addr);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => log::info!("shutdown signal received"),
            Err(e) => log::error!("failed to listen for ctrl-c: {e}"),
        }
        shutdown.cancel();
    });

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("server stopped: {e}");
            ExitCode::FAILURE
        }
    }
}
