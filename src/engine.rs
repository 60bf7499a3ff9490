//! 同步引擎
//!
//! 一个周期：读取状态 → 频率限制 → border 检查 → 拉取一页 → 边分类边选择 → 发布。
//! 周期之间串行执行；同一时刻只允许一个周期在跑。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::{SyncConfig, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_MAX_RESULTS, DEFAULT_PLAYLIST_ID};
use crate::error::{Error, Result};
use crate::feed::FeedClient;
use crate::publisher::Publisher;
use crate::selection::Scan;
use crate::types::{CycleOutcome, Selection, SelectionOutcome, SyncState};

/// 引擎参数
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// 播放列表 ID
    pub feed_id: String,
    /// 每页视频数
    pub max_results: u32,
    /// 两次发布之间的最小间隔
    pub check_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            feed_id: DEFAULT_PLAYLIST_ID.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
        }
    }
}

impl From<&SyncConfig> for EngineOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            feed_id: config.feed.playlist_id.clone(),
            max_results: config.feed.max_results,
            check_interval: config.check_interval,
        }
    }
}

/// 周期互斥标记，drop 时释放
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 同步引擎
pub struct SyncEngine {
    feed: Arc<dyn FeedClient>,
    publisher: Publisher,
    options: EngineOptions,
    in_flight: AtomicBool,
}

impl SyncEngine {
    pub fn new(feed: Arc<dyn FeedClient>, publisher: Publisher, options: EngineOptions) -> Self {
        Self {
            feed,
            publisher,
            options,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// 是否有周期正在进行
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// 执行一个周期
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        self.run_cycle_at(Utc::now()).await
    }

    /// 以指定的当前时间执行一个周期
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            tracing::warn!("上一个周期仍在进行，跳过本次触发");
            return Ok(CycleOutcome::Busy);
        };

        let cycle_id = uuid::Uuid::new_v4().simple().to_string();
        let cycle = &cycle_id[..8];
        tracing::info!("[{}] Checking videos... {}", cycle, now.to_rfc3339());

        let state = self.publisher.store().load()?;

        if let Some(elapsed) = state.secs_since_check(now) {
            let interval = i64::try_from(self.options.check_interval.as_secs()).unwrap_or(i64::MAX);
            if elapsed < interval {
                tracing::info!("[{}] Last check was {} second(s) ago. Aborting...", cycle, elapsed);
                return Ok(CycleOutcome::Throttled {
                    elapsed_secs: elapsed,
                });
            }
        }

        let Some(border_id) = state.border_id.as_deref() else {
            tracing::warn!("[{}] Value borderVideoId not defined. Aborting...", cycle);
            return Err(Error::MissingBorder);
        };

        let selection = self.select_next(&state, border_id).await?;
        tracing::debug!(
            "[{}] Scan finished: found_last={}, first_valid={:?}",
            cycle,
            selection.found_last,
            selection.first_valid
        );

        match selection.outcome {
            SelectionOutcome::NoNewItem => {
                tracing::info!("[{}] No new video found", cycle);
                Ok(CycleOutcome::NoNewItem)
            }
            SelectionOutcome::Selected {
                item,
                border_id,
                reason,
            } => {
                tracing::info!("[{}] Selected {} ({:?})", cycle, item.id, reason);
                self.publisher.publish(&item, &border_id, now).await?;
                Ok(CycleOutcome::Published(item))
            }
        }
    }

    /// 拉取一页并选择下一个视频
    ///
    /// 按顺序逐个分类，命中停止条件后不再分类剩余视频；任何一次分类失败都会中止本周期。
    pub async fn select_next(&self, state: &SyncState, border_id: &str) -> Result<Selection> {
        let page = self
            .feed
            .fetch_page(&self.options.feed_id, self.options.max_results)
            .await?;

        let mut scan = Scan::new(state.last_accepted_id.as_deref(), border_id, page.len());
        for item in page {
            tracing::debug!("Checking video {} - {}", item.id, item.title);
            let class = match self.feed.classify(&item).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to classify {}, stop scanning: {}", item.id, e);
                    return Err(e);
                }
            };
            if scan.step(item, class).is_break() {
                break;
            }
        }

        Ok(scan.finish())
    }
}
