//! 错误类型定义

use thiserror::Error;

/// 库错误类型
///
/// 所有错误都只影响当前周期，下一次定时触发即为重试。
#[derive(Error, Debug)]
pub enum Error {
    /// IO 错误（pointer 文件或状态文件写入失败）
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 状态文件存在但无法解析
    #[error("状态文件损坏: {0}")]
    CorruptState(String),

    /// 未设置 borderVideoId，没有安全的起点
    #[error("borderVideoId 未设置，需要运维先写入状态文件")]
    MissingBorder,

    /// 直播/短视频分类失败，本周期停止扫描
    #[error("视频分类失败: video_id={video_id}, {reason}")]
    Classification { video_id: String, reason: String },

    /// Feed API 请求错误
    #[error("Feed API 错误: {0}")]
    Feed(String),

    /// HTTP 错误
    #[cfg(feature = "youtube")]
    #[error("HTTP 错误: {0}")]
    Http(#[from] reqwest::Error),

    /// git 错误
    #[cfg(feature = "git")]
    #[error("git 错误: {0}")]
    Git(#[from] git2::Error),

    /// Persistence Sink 交接失败
    #[error("持久化交接失败: {0}")]
    Sink(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// 构造分类错误
    pub fn classification(video_id: impl Into<String>, reason: impl ToString) -> Self {
        Error::Classification {
            video_id: video_id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, Error>;
