//! 增量选择算法
//!
//! 按 feed 顺序（最新在前）折叠已分类的视频，决定下一个要发布的视频：
//!
//! - 跳过直播和短视频
//! - 遇到游标（lastVideoId）或 border 时停止，选中它前面（更新）的那个有效视频
//! - 游标和 border 都没出现且扫到页尾时，选中页尾视频追赶进度
//! - 扫完整页都没停下（例如页尾全是直播），且游标不在页内时，回退到最新的有效视频
//!
//! [`Scan`] 是逐步喂入的折叠状态，引擎边分类边喂，停止条件一满足就不再分类剩余视频；
//! [`select`] 是对整页的纯函数包装。

use std::ops::ControlFlow;

use crate::types::{Classification, FeedItem, SelectReason, Selection, SelectionOutcome};

/// 扫描折叠状态
#[derive(Debug)]
pub struct Scan<'a> {
    last_accepted: Option<&'a str>,
    border: &'a str,
    page_len: usize,
    /// 已喂入的视频数（包括被跳过的）
    index: usize,
    /// 上一个有效视频（比当前视频更新）
    last_filtered: Option<FeedItem>,
    first_valid: Option<(usize, FeedItem)>,
    found_last: bool,
    halted: Option<SelectionOutcome>,
}

impl<'a> Scan<'a> {
    pub fn new(last_accepted: Option<&'a str>, border: &'a str, page_len: usize) -> Self {
        Self {
            last_accepted,
            border,
            page_len,
            index: 0,
            last_filtered: None,
            first_valid: None,
            found_last: false,
            halted: None,
        }
    }

    /// 是否已经命中停止条件
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// 喂入下一个视频，`Break` 表示扫描结束
    pub fn step(&mut self, item: FeedItem, class: Classification) -> ControlFlow<()> {
        if self.halted.is_some() {
            return ControlFlow::Break(());
        }

        let i = self.index;
        self.index += 1;

        if !class.is_eligible() {
            tracing::debug!("Skip {} video {} - {}", class, item.id, item.title);
            return ControlFlow::Continue(());
        }

        if self.first_valid.is_none() {
            self.first_valid = Some((i, item.clone()));
        }

        let hit_last = self.last_accepted == Some(item.id.as_str());
        let hit_border = item.id == self.border;
        if hit_last {
            self.found_last = true;
        }

        if hit_last || hit_border {
            let outcome = match self.last_filtered.take() {
                Some(prev) => SelectionOutcome::Selected {
                    item: prev,
                    border_id: self.border.to_string(),
                    reason: if hit_last {
                        SelectReason::AfterCursor
                    } else {
                        SelectReason::AfterBorder
                    },
                },
                None => {
                    tracing::debug!("No new video found. Index: {}", i);
                    SelectionOutcome::NoNewItem
                }
            };
            self.halted = Some(outcome);
            return ControlFlow::Break(());
        }

        if i + 1 == self.page_len {
            self.halted = Some(SelectionOutcome::Selected {
                item,
                border_id: self.border.to_string(),
                reason: SelectReason::EndOfPage,
            });
            return ControlFlow::Break(());
        }

        self.last_filtered = Some(item);
        ControlFlow::Continue(())
    }

    /// 结束扫描，得出结果
    pub fn finish(self) -> Selection {
        let first_valid = self.first_valid.as_ref().map(|(i, _)| *i);

        let outcome = match self.halted {
            Some(outcome) => outcome,
            None => match self.first_valid {
                Some((_, item)) if !self.found_last => SelectionOutcome::Selected {
                    item,
                    border_id: self.border.to_string(),
                    reason: SelectReason::Recovery,
                },
                _ => SelectionOutcome::NoNewItem,
            },
        };

        Selection {
            outcome,
            found_last: self.found_last,
            first_valid,
        }
    }
}

/// 对一整页已分类的视频做选择
pub fn select(
    page: &[(FeedItem, Classification)],
    last_accepted: Option<&str>,
    border: &str,
) -> Selection {
    let mut scan = Scan::new(last_accepted, border, page.len());
    for (item, class) in page {
        if scan.step(item.clone(), *class).is_break() {
            break;
        }
    }
    scan.finish()
}
