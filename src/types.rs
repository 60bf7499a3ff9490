//! 数据类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 播放列表中的一个视频
///
/// 拉取后不可变；分类结果由 [`crate::feed::FeedClient::classify`] 计算，不存储在这里。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// 视频 ID
    pub id: String,
    /// 标题
    pub title: String,
    /// 在本页中的位置（0 = 最新）
    pub position: usize,
    /// 发布时间（来自 snippet.publishedAt，可能缺失）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    /// 原始 playlistItem JSON（透传给下游观察者）
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub raw: serde_json::Value,
}

impl FeedItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, position: usize) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            position,
            published_at: None,
            raw: serde_json::Value::Null,
        }
    }
}

/// 视频分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// 普通视频，可以发布
    Eligible,
    /// 直播（进行中或预告）
    Live,
    /// 短视频
    Short,
}

impl Classification {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Classification::Eligible)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Eligible => write!(f, "eligible"),
            Classification::Live => write!(f, "live"),
            Classification::Short => write!(f, "short"),
        }
    }
}

/// 持久化的同步状态
///
/// 文件格式与旧版保持一致：`{ "date": ..., "lastVideoId": ..., "borderVideoId": ... }`。
/// 只由 Publisher 整体覆盖写入。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// 上次成功发布的时间
    #[serde(rename = "date", default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    /// 游标：上次成功发布的视频 ID
    #[serde(rename = "lastVideoId", default, skip_serializing_if = "Option::is_none")]
    pub last_accepted_id: Option<String>,
    /// 边界：运维写入的最早可发布视频 ID
    #[serde(rename = "borderVideoId", default, skip_serializing_if = "Option::is_none")]
    pub border_id: Option<String>,
}

impl SyncState {
    /// 只设置 border 的初始状态
    pub fn seeded(border_id: impl Into<String>) -> Self {
        Self {
            border_id: Some(border_id.into()),
            ..Default::default()
        }
    }

    /// 距上次检查经过的秒数（从未检查过返回 None）
    pub fn secs_since_check(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_checked_at.map(|t| (now - t).num_seconds())
    }
}

/// 选中原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectReason {
    /// 游标之前（更新）的一个视频
    AfterCursor,
    /// border 之前（更新）的一个视频
    AfterBorder,
    /// 游标和 border 都不在本页，取页尾视频追赶
    EndOfPage,
    /// 扫描没有命中停止条件，重新同步到最新的有效视频
    Recovery,
}

/// 单次选择的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// 没有新视频
    NoNewItem,
    /// 选中一个视频
    Selected {
        item: FeedItem,
        /// border 原样带到下一周期
        border_id: String,
        reason: SelectReason,
    },
}

/// 扫描结束后的完整结果
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub outcome: SelectionOutcome,
    /// 扫描中是否见到旧游标
    pub found_last: bool,
    /// 第一个有效视频在本页中的位置
    pub first_valid: Option<usize>,
}

impl Selection {
    pub fn selected(&self) -> Option<&FeedItem> {
        match &self.outcome {
            SelectionOutcome::Selected { item, .. } => Some(item),
            SelectionOutcome::NoNewItem => None,
        }
    }
}

/// 一个周期的结果
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// 上一个周期还在进行中
    Busy,
    /// 距上次发布不足 check_interval
    Throttled { elapsed_secs: i64 },
    /// 没有新视频
    NoNewItem,
    /// 已发布
    Published(FeedItem),
}

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Published,
}

/// 推送给观察者的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// 新视频已发布（pointer 文件已推送，游标已前进）
    Published {
        item: FeedItem,
        published_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::Published { .. } => EventType::Published,
        }
    }
}
