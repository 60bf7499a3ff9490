//! episode-agent - 播放列表同步 Agent
//!
//! 负责：
//! - 定时检查播放列表
//! - 选出下一个要发布的视频，写入 episode.json 并推送到远程仓库
//! - 维护同步状态文件

use episode_sync::agent::{cleanup_stale_agent, is_agent_running, Agent};
use episode_sync::SyncConfig;
use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("episode_sync=debug".parse()?))
        .init();

    tracing::info!("🚀 episode-agent v{}", env!("CARGO_PKG_VERSION"));

    // 解析配置
    let config = SyncConfig::from_env()?;

    // 检查是否已有 Agent 运行
    if is_agent_running(&config) {
        tracing::error!("❌ Agent is already running, exiting");
        std::process::exit(1);
    }

    // 清理残留状态
    if let Err(e) = cleanup_stale_agent(&config) {
        tracing::warn!("Failed to cleanup stale state: {}", e);
    }

    let agent = Agent::new(config)?;
    agent.broadcaster().on_published(|item| {
        tracing::info!("🔔 New episode ready: {} - {}", item.id, item.title);
    });
    agent.run().await?;

    tracing::info!("👋 episode-agent exiting");
    Ok(())
}
