//! 发布器
//!
//! 把选中的视频提交出去：写 pointer 文件 → 交给 Sink 持久化 → 推进游标 → 通知观察者。
//! 游标只在 Sink 成功之后才前进；任何一步失败，下一周期会重新选中同一个视频。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::broadcaster::Broadcaster;
use crate::cursor::CursorStore;
use crate::error::{Error, Result};
use crate::sink::PersistenceSink;
use crate::types::{Event, FeedItem, SyncState};

/// pointer 文件内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    pub id: String,
}

/// 发布器
pub struct Publisher {
    pointer_path: PathBuf,
    store: CursorStore,
    sink: Arc<dyn PersistenceSink>,
    broadcaster: Arc<Broadcaster>,
}

impl Publisher {
    pub fn new<P: Into<PathBuf>>(
        pointer_path: P,
        store: CursorStore,
        sink: Arc<dyn PersistenceSink>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            pointer_path: pointer_path.into(),
            store,
            sink,
            broadcaster,
        }
    }

    pub fn pointer_path(&self) -> &Path {
        &self.pointer_path
    }

    pub fn store(&self) -> &CursorStore {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// 发布一个视频，返回写入后的状态
    pub async fn publish(
        &self,
        item: &FeedItem,
        border_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SyncState> {
        tracing::info!("Pushing video {} - {}", item.id, item.title);

        // 1. pointer 文件
        self.write_pointer(&item.id).await.map_err(|e| {
            tracing::error!("An error has occurred saving episode: {}", e);
            e
        })?;

        // 2. 对外可见
        self.sink.persist(&self.pointer_path).await.map_err(|e| {
            tracing::error!("持久化交接失败，游标不前进: {}", e);
            match e {
                Error::Sink(_) => e,
                other => Error::Sink(other.to_string()),
            }
        })?;

        // 3. 推进游标
        let state = SyncState {
            last_checked_at: Some(now),
            last_accepted_id: Some(item.id.clone()),
            border_id: Some(border_id.to_string()),
        };
        self.store.save(&state).map_err(|e| {
            tracing::error!("An error has occurred saving data: {}", e);
            e
        })?;

        // 4. 通知
        self.broadcaster.broadcast(Event::Published {
            item: item.clone(),
            published_at: now,
        });

        tracing::info!("✅ Changes pushed and saved: {}", item.id);
        Ok(state)
    }

    async fn write_pointer(&self, id: &str) -> Result<()> {
        if let Some(parent) = self.pointer_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string(&Pointer { id: id.to_string() })?;
        tokio::fs::write(&self.pointer_path, json).await?;
        Ok(())
    }
}

/// 读取 pointer 文件
pub fn read_pointer(path: &Path) -> Result<Pointer> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
