use clap::Parser;
use itemflow_core::db::open_db;
use itemflow_core::{core_version, init_logging, SqliteItemRepository};
use itemflow_server::{router, AppState, CliArgs, ServerConfig};
use log::{error, info};
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_logging(&config.log_level, config.log_dir.as_deref()).map_err(anyhow::Error::msg)?;

    let conn = open_db(&config.database_path)?;
    let repo = SqliteItemRepository::try_new(conn)?;
    let app = router(AppState::new(repo, config.processor.clone()));

    let listener = TcpListener::bind(config.server_addr).await?;
    log_startup_info(&config);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("event=server_stop module=server status=ok");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        info!(
            "event=server_start module=server status=ok version={} config={:?}",
            core_version(),
            config
        );
    } else {
        info!(
            "event=server_start module=server status=ok version={} addr={} db={} max_workers={}",
            core_version(),
            config.server_addr,
            config.database_path.display(),
            config.processor.max_workers
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(
                    "event=signal_install module=server status=error signal=SIGTERM error={err}"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("event=signal_install module=server status=error signal=SIGINT error={err}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => info!("event=shutdown module=server status=start signal=SIGINT"),
        () = terminate => info!("event=shutdown module=server status=start signal=SIGTERM"),
    }
}
