//! Agent 服务
//!
//! 把配置装配成 FeedClient / Sink / Publisher / SyncEngine / Scheduler，运行到收到中断信号。

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::scheduler::Scheduler;
use crate::broadcaster::Broadcaster;
use crate::config::SyncConfig;
use crate::cursor::CursorStore;
use crate::engine::{EngineOptions, SyncEngine};
use crate::feed::YouTubeClient;
use crate::publisher::Publisher;
use crate::sink::{GitSink, PersistenceSink};

/// Agent 服务
pub struct Agent {
    config: SyncConfig,
    sink: Arc<dyn PersistenceSink>,
    broadcaster: Arc<Broadcaster>,
    engine: Arc<SyncEngine>,
    scheduler: Arc<Scheduler>,
}

impl Agent {
    /// 创建 Agent
    pub fn new(config: SyncConfig) -> Result<Self> {
        config.validate()?;

        // 确保数据目录存在
        fs::create_dir_all(&config.data_dir).context("创建数据目录失败")?;

        let feed = Arc::new(YouTubeClient::new(&config.feed)?);
        let sink: Arc<dyn PersistenceSink> =
            Arc::new(GitSink::new(config.repo_dir(), config.repo.clone()));

        Ok(Self::with_parts(config, feed, sink))
    }

    /// 用指定的 FeedClient 和 Sink 创建 Agent
    pub fn with_parts(
        config: SyncConfig,
        feed: Arc<dyn crate::feed::FeedClient>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        let broadcaster = Broadcaster::new();
        let publisher = Publisher::new(
            config.pointer_path(),
            CursorStore::new(config.state_path()),
            sink.clone(),
            broadcaster.clone(),
        );
        let engine = Arc::new(SyncEngine::new(
            feed,
            publisher,
            EngineOptions::from(&config),
        ));
        let scheduler = Scheduler::new(engine.clone(), config.poll_interval);

        Self {
            config,
            sink,
            broadcaster,
            engine,
            scheduler,
        }
    }

    /// 观察者注册入口（例如下游分发步骤）
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// 运行 Agent，直到收到中断信号
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting...");
        write_pid_file(&self.config)?;

        let result = self.run_inner().await;

        self.cleanup();
        result
    }

    async fn run_inner(&self) -> Result<()> {
        self.sink.prepare().await.context("准备远程仓库失败")?;

        self.scheduler.start();
        tracing::info!("🚀 Started.");

        tokio::signal::ctrl_c().await.context("监听中断信号失败")?;
        tracing::info!("收到中断信号，准备退出...");

        self.scheduler.stop().await;
        Ok(())
    }

    /// 清理资源
    fn cleanup(&self) {
        let pid_path = self.config.pid_path();
        if pid_path.exists() {
            let _ = fs::remove_file(&pid_path);
        }
        tracing::info!("🧹 Agent 清理完成");
    }
}

/// 写入 PID 文件
fn write_pid_file(config: &SyncConfig) -> Result<()> {
    let pid = std::process::id();
    let pid_path = config.pid_path();
    fs::write(&pid_path, pid.to_string())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&pid_path, fs::Permissions::from_mode(0o600))?;
    }
    tracing::debug!("📝 写入 PID 文件: {} (pid={})", pid_path.display(), pid);
    Ok(())
}

/// 检查 Agent 是否正在运行
pub fn is_agent_running(config: &SyncConfig) -> bool {
    let pid_path = config.pid_path();
    if !pid_path.exists() {
        return false;
    }

    let pid: i32 = match fs::read_to_string(&pid_path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
    {
        Some(p) => p,
        None => return false,
    };

    process_alive(pid)
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    // 信号 0 只检查进程是否存在
    unsafe { libc::kill(pid, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    false
}

/// 清理残留的 PID 文件
pub fn cleanup_stale_agent(config: &SyncConfig) -> Result<()> {
    let pid_path = config.pid_path();
    if pid_path.exists() {
        fs::remove_file(&pid_path)?;
        tracing::debug!("🧹 删除残留 PID 文件: {:?}", pid_path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_pid_file() {
        let tmp = TempDir::new().unwrap();
        let config = SyncConfig {
            data_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };

        write_pid_file(&config).unwrap();
        let content = fs::read_to_string(config.pid_path()).unwrap();
        assert_eq!(content, std::process::id().to_string());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            assert!(is_agent_running(&config));
            let mode = fs::metadata(config.pid_path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
