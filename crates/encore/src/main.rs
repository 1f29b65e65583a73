use anyhow::Context;
use clap::Parser;
use scheduler::PayoutTimer;
use server::app::ApplicationServer;
use server::services::Services;
use std::sync::Arc;
use tokio::{signal, task::JoinSet};
use tracing::info;
use utils::{AppConfig, Logger};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // 根据 CARGO_ENV 加载对应的环境配置文件
    utils::EnvLoader::load_env_file().ok();

    let config = Arc::new(AppConfig::parse());
    let _guard = Logger::new(config.cargo_env);

    let mut set = JoinSet::new();

    // 1. 启动api & services
    // 2. 启动结算Timer
    {
        let config = config.clone();
        set.spawn(async move {
            ApplicationServer::serve(config)
                .await
                .context("🔴 Failed to start server")
                .expect("🔴 Failed to start server");
        });
    }

    {
        let config = config.clone();
        set.spawn(async move {
            // Timer需要自己的service实例(与HTTP侧共用同一个库)
            let db = database(config.clone()).await;
            let services = Services::new(db, config.clone());
            let timer = Arc::new(PayoutTimer::new(Some(config.payout_cron.clone()), services));
            timer.run().await;
        });
    }

    tokio::select! {
        _ = async {
            while set.join_next().await.is_some() {
                info!("🔔 Task completed");
            }
        } => {},
        _ = shutdown_signal() => {
            info!("🔔 Shutdown signal received, stopping all tasks...");
            set.abort_all();
        },
    }

    Ok(())
}

async fn database(config: Arc<AppConfig>) -> database::Database {
    let db = database::Database::new(config)
        .await
        .expect("🔴 Failed to connect mongodb");
    db.init_indexes().await.expect("🔴 Failed to init indexes");
    db
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("🔴 Failed to install Ctrl+C handler");
        info!("🔔 Ctrl+C received");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("🔴 Failed to install signal handler")
            .recv()
            .await;
        info!("🔔 Terminate signal received");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::warn!("❌ Signal received, starting graceful shutdown...");
}
