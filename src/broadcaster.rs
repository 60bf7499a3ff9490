//! 事件广播器
//!
//! 显式的观察者注册表，由调用方创建后传给 Publisher。
//! 支持两种观察者：同步回调，以及 mpsc 通道订阅。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::types::{Event, FeedItem};

/// 观察者 ID
pub type ObserverId = u64;

/// 事件发送通道
pub type EventSender = mpsc::Sender<Event>;

type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// 事件广播器
pub struct Broadcaster {
    /// 回调观察者：ObserverId → 回调
    callbacks: RwLock<HashMap<ObserverId, Callback>>,
    /// 通道订阅者：ObserverId → 发送通道
    senders: RwLock<HashMap<ObserverId, EventSender>>,
    /// 下一个观察者 ID
    next_id: RwLock<ObserverId>,
}

impl Broadcaster {
    /// 创建新的广播器
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_id(&self) -> ObserverId {
        let mut next_id = self.next_id.write();
        let id = *next_id;
        *next_id += 1;
        id
    }

    /// 注册任意事件的回调
    pub fn on_event<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.callbacks.write().insert(id, Arc::new(callback));
        tracing::debug!("📡 Observer registered: id={}", id);
        id
    }

    /// 注册 Published 回调
    pub fn on_published<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&FeedItem) + Send + Sync + 'static,
    {
        self.on_event(move |event| match event {
            Event::Published { item, .. } => callback(item),
        })
    }

    /// 注册通道订阅者
    pub fn register(&self, sender: EventSender) -> ObserverId {
        let id = self.next_id();
        self.senders.write().insert(id, sender);
        tracing::debug!("📡 Subscriber registered: id={}", id);
        id
    }

    /// 创建通道并订阅
    pub fn subscribe(&self, capacity: usize) -> (ObserverId, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (self.register(tx), rx)
    }

    /// 注销观察者
    pub fn unregister(&self, id: ObserverId) {
        self.callbacks.write().remove(&id);
        self.senders.write().remove(&id);
        tracing::debug!("📡 Observer unregistered: id={}", id);
    }

    /// 广播事件（非阻塞，通道满或已关闭时丢弃），返回送达的观察者数
    pub fn broadcast(&self, event: Event) -> usize {
        let event_type = event.event_type();

        // 先复制出来再调用，回调里可以安全地注册/注销
        let callbacks: Vec<Callback> = self.callbacks.read().values().cloned().collect();
        let senders: Vec<(ObserverId, EventSender)> = self
            .senders
            .read()
            .iter()
            .map(|(id, s)| (*id, s.clone()))
            .collect();

        if callbacks.is_empty() && senders.is_empty() {
            tracing::trace!("📡 No observers: event_type={:?}", event_type);
            return 0;
        }

        tracing::debug!(
            "📡 Broadcasting event: event_type={:?}, observers={}",
            event_type,
            callbacks.len() + senders.len()
        );

        let mut delivered = 0;
        for callback in callbacks {
            callback(&event);
            delivered += 1;
        }

        for (id, sender) in senders {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!("📡 Channel full, dropping event: id={}", id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!("📡 Channel closed: id={}", id);
                    self.senders.write().remove(&id);
                }
            }
        }

        delivered
    }

    /// 当前观察者数
    pub fn observer_count(&self) -> usize {
        self.callbacks.read().len() + self.senders.read().len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self {
            callbacks: RwLock::new(HashMap::new()),
            senders: RwLock::new(HashMap::new()),
            next_id: RwLock::new(1),
        }
    }
}
