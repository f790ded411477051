use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tweak_engine::TweakEngine;
use tweakctl::{commands, logging, output, Cli, CtlConfig, RpcBackend, RpcClient};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CtlConfig::load_from(path)?,
        None => CtlConfig::load()?,
    };
    logging::init(&config.log_level);

    let socket_path = RpcClient::discover_socket_path(cli.socket.as_deref(), &config);
    debug!("tweakctl v{} using daemon socket {}", tweak_common::VERSION, socket_path);
    let backend = Arc::new(RpcBackend::new(
        socket_path,
        Duration::from_millis(config.connect_timeout_ms),
    ));
    let engine = TweakEngine::new(backend, config.engine.clone());
    tokio::spawn(commands::log_feedback(engine.subscribe_feedback()));

    match commands::run(&engine, cli.command, cli.json).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::display_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    }
}
