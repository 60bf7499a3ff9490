//! episode-sync - 播放列表增量同步
//!
//! 定时轮询一个视频播放列表，找出上次发布之后的新视频，过滤掉直播和短视频，
//! 每个周期最多发布一个：写 pointer 文件、推送到远程仓库、推进游标。
//!
//! # 核心功能
//!
//! - **增量选择**: 基于游标 + border 的最新优先扫描（见 [`selection`]）
//! - **状态持久化**: 整体覆盖写入的 JSON 状态文件（见 [`cursor`]）
//! - **发布**: pointer 文件 → Sink → 游标 → 通知，游标永远不超前于对外可见的结果
//! - **Agent 模式**: 定时调度 + 单实例守护
//!
//! # Feature Flags
//!
//! - `youtube`: YouTube Data API FeedClient
//! - `git`: git 远程仓库 PersistenceSink
//! - `agent`: Agent 二进制（依赖 `youtube` + `git`）

pub mod agent;
pub mod broadcaster;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod feed;
pub mod publisher;
pub mod selection;
pub mod sink;
pub mod types;

// Re-exports
pub use broadcaster::{Broadcaster, ObserverId};
pub use config::{FeedConfig, RepoConfig, SyncConfig};
pub use cursor::CursorStore;
pub use engine::{EngineOptions, SyncEngine};
pub use error::{Error, Result};
pub use feed::FeedClient;
pub use publisher::{read_pointer, Pointer, Publisher};
pub use selection::{select, Scan};
pub use sink::{NullSink, PersistenceSink};
pub use types::*;

#[cfg(feature = "youtube")]
pub use feed::YouTubeClient;

#[cfg(feature = "git")]
pub use sink::GitSink;
