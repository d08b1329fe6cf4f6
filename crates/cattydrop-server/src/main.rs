//! Cattydrop 服务端入口
//!
//! 启动顺序：
//! 1. 日志初始化（log -> tracing 桥接）
//! 2. 加载配置并套用命令行覆盖
//! 3. 初始化共享状态，启动保留期清理任务
//! 4. 启动 axum 服务，ctrl-c 优雅退出

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use cattydrop_core::{AppConfig, RetentionSweeper, local_ip};
use cattydrop_server::{AppState, router};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cattydrop", version, about = "局域网文件/消息互传 - Web 服务端")]
struct Args {
    /// 配置文件路径（默认: 用户配置目录下的 cattydrop/config.toml）
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// 监听端口
    #[arg(short, long)]
    port: Option<u16>,
    /// 上传目录
    #[arg(short, long)]
    upload_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 桥接 log crate（cattydrop-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    // 初始化日志
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cattydrop_core=debug")),
        )
        .try_init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(upload_dir) = args.upload_dir {
        config.upload_dir = upload_dir;
    }

    let state = AppState::new(config.clone()).await?;

    let sweeper = RetentionSweeper::new(
        state.store.clone(),
        config.file_ttl(),
        config.sweep_interval(),
        config.sweep_retry(),
    )
    .spawn();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Cattydrop starting...");
    tracing::info!("Access the app at: http://{}:{}", local_ip(), config.port);

    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down");
}
