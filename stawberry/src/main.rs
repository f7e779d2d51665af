//! Stawberry Server Entry Point

use anyhow::Context;
use clap::Parser;
use stawberry::audit::writer::AuditLogWriter;
use stawberry::cli::serve::ServeArgs;
use stawberry::cli::{Cli, Commands};
use stawberry::config::AuditConfig;
use stawberry::server::{self, ServerConfig};
use stawberry::shutdown::ShutdownController;
use stawberry::{logging, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init().context("failed to initialize logging")?;

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let audit_config = AuditConfig::from_env();
    let (sink, query) = args.build_sink();
    info!(sink = ?args.sink, path = %args.sink_path.display(), "Audit log sink selected");

    let writer = AuditLogWriter::new(audit_config, sink)
        .context("failed to start audit log pipeline")?;

    let state = AppState {
        audit_log_writer: writer,
        audit_log_query: query,
        shutdown: ShutdownController::default(),
    };

    let config = ServerConfig::from_args(args.host, args.port);
    server::run(&config, state).await.context("server error")?;
    Ok(())
}
