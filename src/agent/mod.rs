//! Agent 模块 - 定时调度 + 单实例守护
//!
//! Agent 是状态文件的唯一写入者，负责：
//! - 按固定周期触发同步周期（同一时刻只有一个周期）
//! - 启动时准备远程仓库
//! - 通过 PID 文件保证同一数据目录只有一个进程

mod scheduler;

#[cfg(feature = "agent")]
mod server;

pub use scheduler::Scheduler;

#[cfg(feature = "agent")]
pub use server::{cleanup_stale_agent, is_agent_running, Agent};
