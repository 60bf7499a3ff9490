//! 定时调度
//!
//! 启动后立即执行一次周期，之后每隔 `poll_interval` 执行一次。
//! 周期内的错误只记日志，不会停止调度。

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::engine::SyncEngine;
use crate::error::Error;
use crate::types::CycleOutcome;

/// 连续多少次状态文件损坏后提醒运维
const CORRUPT_ALERT_THRESHOLD: u32 = 3;

/// 周期调度器
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    poll_interval: Duration,
    scheduled: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
    /// 停止信号，只在两次 tick 之间检查
    shutdown: Notify,
    /// 已执行的周期数
    cycles: AtomicU64,
    /// 连续 CorruptState 次数
    corrupt_streak: AtomicU32,
}

impl Scheduler {
    pub fn new(engine: Arc<SyncEngine>, poll_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            engine,
            poll_interval,
            scheduled: AtomicBool::new(false),
            handle: Mutex::new(None),
            shutdown: Notify::new(),
            cycles: AtomicU64::new(0),
            corrupt_streak: AtomicU32::new(0),
        })
    }

    /// 启动调度，已经启动过时返回 false
    pub fn start(self: &Arc<Self>) -> bool {
        if self
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::info!("Cronjob already scheduled.");
            return false;
        }

        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(scheduler.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                // 第一次 tick 立即返回
                tokio::select! {
                    biased;
                    _ = scheduler.shutdown.notified() => break,
                    _ = ticker.tick() => {}
                }
                scheduler.run_once().await;
            }
        });
        *self.handle.lock() = Some(handle);

        tracing::info!(
            "⏰ Cronjob scheduled, every {}s",
            self.poll_interval.as_secs()
        );
        true
    }

    /// 停止调度
    ///
    /// 不再触发新的周期；正在进行的周期会执行完再返回。
    pub async fn stop(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            self.shutdown.notify_one();
            if let Err(e) = handle.await {
                tracing::warn!("调度任务异常退出: {}", e);
            }
        }
        self.scheduled.store(false, Ordering::Release);
        tracing::info!("⏹️ Cronjob stopped");
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// 已执行的周期数
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// 执行一个周期并记录结果
    pub async fn run_once(&self) -> Option<CycleOutcome> {
        self.cycles.fetch_add(1, Ordering::Relaxed);

        match self.engine.run_cycle().await {
            Ok(outcome) => {
                self.corrupt_streak.store(0, Ordering::Relaxed);
                if let CycleOutcome::Published(item) = &outcome {
                    tracing::info!("📺 Published {} - {}", item.id, item.title);
                }
                Some(outcome)
            }
            Err(Error::CorruptState(msg)) => {
                let streak = self.corrupt_streak.fetch_add(1, Ordering::Relaxed) + 1;
                if streak >= CORRUPT_ALERT_THRESHOLD {
                    tracing::error!(
                        "🚨 状态文件连续 {} 次无法解析，需要人工处理: {}",
                        streak,
                        msg
                    );
                } else {
                    tracing::warn!("状态文件无法解析 ({}): {}", streak, msg);
                }
                None
            }
            Err(e) => {
                self.corrupt_streak.store(0, Ordering::Relaxed);
                tracing::error!("周期失败: {}", e);
                None
            }
        }
    }

    /// 连续 CorruptState 次数
    pub fn corrupt_streak(&self) -> u32 {
        self.corrupt_streak.load(Ordering::Relaxed)
    }
}
