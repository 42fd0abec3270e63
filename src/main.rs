// ==========================================
// 葡萄酒产线批次系统 - 命令行入口
// ==========================================
// 用法: wine-batch <backfill|simulate|publish>
// 配置: 环境变量（见 config::config_keys）
// Ctrl-C: 在记录边界停止；回灌模式整体回滚
// ==========================================

use anyhow::{Context, Result};
use tokio::sync::watch;
use wine_batch::app::{run_backfill, run_publish, run_simulate, AppState, RunMode};
use wine_batch::config::SimulationConfig;
use wine_batch::logging;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let mode: RunMode = std::env::args()
        .nth(1)
        .context("缺少运行模式，用法: wine-batch <backfill|simulate|publish>")?
        .parse()?;

    tracing::info!("==================================================");
    tracing::info!("{} v{} - {:?}", wine_batch::APP_NAME, wine_batch::VERSION, mode);
    tracing::info!("==================================================");

    let config = SimulationConfig::from_env().context("配置加载失败")?;

    // 停止信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("收到 Ctrl-C，正在停止...");
            let _ = shutdown_tx.send(true);
            // 发送端保持存活直到进程退出
            std::future::pending::<()>().await;
        }
    });

    match mode {
        RunMode::Backfill => {
            let state = AppState::new(config).context("应用初始化失败")?;
            let report = run_backfill(&state, shutdown_rx).await?;
            tracing::info!("回灌报告: {}", serde_json::to_string(&report)?);
        }
        RunMode::Simulate => {
            let state = AppState::new(config).context("应用初始化失败")?;
            let report = run_simulate(&state, shutdown_rx).await?;
            tracing::info!("仿真报告: {}", serde_json::to_string(&report)?);
        }
        RunMode::Publish => {
            let report = run_publish(&config, shutdown_rx).await?;
            tracing::info!("发布报告: {}", serde_json::to_string(&report)?);
        }
    }

    Ok(())
}
