//! 同步配置
//!
//! 所有配置来自环境变量，未设置时使用默认值。

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// 默认播放列表（频道的 uploads 列表）
pub const DEFAULT_PLAYLIST_ID: &str = "UU31diBQ4Fg8_2uVUTvP7Jjg";
/// 每页视频数
pub const DEFAULT_MAX_RESULTS: u32 = 20;
/// 两次发布之间的最小间隔（秒）
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3600;
/// 定时器周期（秒），每 2 小时
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2 * 3600;

/// YouTube Data API 地址
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
/// 短视频探测地址
pub const DEFAULT_SHORTS_BASE: &str = "https://www.youtube.com";

/// 状态文件名
pub const STATE_FILE_NAME: &str = "youtube_data.json";
/// pointer 文件名
pub const POINTER_FILE_NAME: &str = "episode.json";

/// Feed API 配置
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub playlist_id: String,
    pub api_key: String,
    pub max_results: u32,
    pub api_base: String,
    pub shorts_base: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            playlist_id: DEFAULT_PLAYLIST_ID.to_string(),
            api_key: String::new(),
            max_results: DEFAULT_MAX_RESULTS,
            api_base: DEFAULT_API_BASE.to_string(),
            shorts_base: DEFAULT_SHORTS_BASE.to_string(),
        }
    }
}

/// 远程仓库配置
#[derive(Debug, Clone, Default)]
pub struct RepoConfig {
    /// 不带协议的仓库地址，例如 `github.com/user/repo.git`
    pub url: String,
    pub name: String,
    pub user: String,
    pub password: String,
    /// 提交者
    pub author_name: String,
    pub author_email: String,
    /// 推送分支
    pub branch: String,
}

impl RepoConfig {
    /// 远程地址（凭据由 git2 回调提供，不拼进 URL）
    pub fn remote_url(&self) -> String {
        if self.url.contains("://") {
            return self.url.clone();
        }
        format!("https://{}", self.url)
    }
}

/// 同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 数据目录（默认 ~/.episode-sync）
    pub data_dir: PathBuf,
    pub feed: FeedConfig,
    pub repo: RepoConfig,
    /// 两次发布之间的最小间隔
    pub check_interval: Duration,
    /// 定时器周期
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".episode-sync");

        Self {
            data_dir,
            feed: FeedConfig::default(),
            repo: RepoConfig {
                branch: "main".to_string(),
                ..Default::default()
            },
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl SyncConfig {
    /// 从环境变量创建配置
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = env("EPISODE_SYNC_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(id) = env("PLAYLIST_ID") {
            config.feed.playlist_id = id;
        }
        config.feed.api_key = env("YOUTUBE_API_KEY").unwrap_or_default();
        if let Some(n) = env("MAX_RESULTS") {
            config.feed.max_results = parse_num("MAX_RESULTS", &n)?;
        }
        if let Some(base) = env("YOUTUBE_API_BASE") {
            config.feed.api_base = base;
        }

        if let Some(secs) = env("CHECK_INTERVAL_SECS") {
            config.check_interval = Duration::from_secs(parse_num("CHECK_INTERVAL_SECS", &secs)?);
        }
        if let Some(secs) = env("POLL_INTERVAL_SECS") {
            config.poll_interval = Duration::from_secs(parse_num("POLL_INTERVAL_SECS", &secs)?);
        }

        config.repo.url = env("REPO_URL").unwrap_or_default();
        config.repo.name = env("REPO_NAME").unwrap_or_default();
        config.repo.user = env("REPO_USER").unwrap_or_default();
        config.repo.password = env("REPO_PASSWORD").unwrap_or_default();
        config.repo.author_name = env("GIT_USERNAME").unwrap_or_default();
        config.repo.author_email = env("GIT_EMAIL").unwrap_or_default();
        if let Some(branch) = env("REPO_BRANCH") {
            config.repo.branch = branch;
        }

        Ok(config)
    }

    /// 检查 Agent 运行所需的配置是否齐全
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("YOUTUBE_API_KEY", &self.feed.api_key),
            ("PLAYLIST_ID", &self.feed.playlist_id),
            ("REPO_URL", &self.repo.url),
            ("REPO_NAME", &self.repo.name),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(k, _)| *k)
            .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!("缺少环境变量: {}", missing.join(", "))));
        }
        if self.feed.max_results == 0 {
            return Err(Error::Config("MAX_RESULTS 必须大于 0".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("POLL_INTERVAL_SECS 必须大于 0".into()));
        }
        Ok(())
    }

    /// 状态文件路径
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE_NAME)
    }

    /// 本地仓库目录
    pub fn repo_dir(&self) -> PathBuf {
        self.data_dir.join("RemoteRepo").join(&self.repo.name)
    }

    /// pointer 文件路径
    pub fn pointer_path(&self) -> PathBuf {
        self.repo_dir().join(POINTER_FILE_NAME)
    }

    /// PID 文件路径
    pub fn pid_path(&self) -> PathBuf {
        self.data_dir.join("agent.pid")
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} 不是合法数字: {}", key, value)))
}
