//! HTTPサーバー起動
//!
//! シャットダウン時はHTTPサーバーの停止後に監査ログパイプラインを排出する。

use crate::api::create_app;
use crate::shutdown::ShutdownController;
use crate::AppState;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Bind address of the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl ServerConfig {
    /// Build from CLI arguments.
    pub fn from_args(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// サーバーを起動し、停止後に監査ログを書き出す
pub async fn run(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let writer = state.audit_log_writer.clone();
    let shutdown = state.shutdown.clone();

    let listener = match TcpListener::bind(config.bind_addr()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.bind_addr(), error = %e, "Failed to bind");
            writer.shutdown().await;
            return Err(e);
        }
    };
    info!(addr = %listener.local_addr()?, "Stawberry server listening");

    let app = create_app(state);
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await;

    if let Err(e) = &result {
        error!(error = %e, "Server error");
    }

    info!("HTTP server stopped, draining audit log pipeline");
    writer.shutdown().await;
    info!("Server shutdown complete");
    result
}

/// シャットダウンシグナルを待機
async fn shutdown_signal(shutdown: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = shutdown.wait() => {
            info!("Shutdown requested, shutting down...");
        }
    }
}
