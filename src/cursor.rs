//! 同步状态持久化
//!
//! 状态文件是一个 JSON 对象，每次整体覆盖写入（先写临时文件再 rename），
//! 保证时间戳、游标、border 三者一致。

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::SyncState;

/// 状态文件存储
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// 状态文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取状态
    ///
    /// 文件不存在或为空时返回默认状态（首次启动）；内容无法解析时返回 `CorruptState`。
    pub fn load(&self) -> Result<SyncState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("状态文件不存在，使用空状态: {:?}", self.path);
                return Ok(SyncState::default());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(SyncState::default());
        }

        serde_json::from_str(&content)
            .map_err(|e| Error::CorruptState(format!("{}: {}", self.path.display(), e)))
    }

    /// 整体覆盖写入状态
    pub fn save(&self, state: &SyncState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            "💾 状态已保存: lastVideoId={:?}, borderVideoId={:?}",
            state.last_accepted_id,
            state.border_id
        );
        Ok(())
    }
}
