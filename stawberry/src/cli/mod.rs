//! CLI module for stawberry

/// serve サブコマンド
pub mod serve;

use clap::{Parser, Subcommand};

/// Stawberry - asynchronous audit logging HTTP server
#[derive(Parser, Debug)]
#[command(name = "stawberry")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    STAWBERRY_HOST                       Bind address (default: 0.0.0.0)
    STAWBERRY_PORT                       Listen port (default: 8080)
    STAWBERRY_LOG_LEVEL                  Log level (default: info)
    STAWBERRY_LOG_FORMAT                 Log format: text or json (default: text)
    STAWBERRY_AUDIT_QUEUE_SIZE           Intake queue capacity (default: 1000)
    STAWBERRY_AUDIT_WORKER_POOL          Sanitizing workers (default: 4)
    STAWBERRY_AUDIT_BATCH_SIZE           Initial buffer capacity (default: 100)
    STAWBERRY_AUDIT_FLUSH_INTERVAL_SECS  Periodic flush interval (default: 5)
    STAWBERRY_AUDIT_RETRY_DELAY_MS       First retry delay of sink writes (default: 250)
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve(serve::ServeArgs),
}
