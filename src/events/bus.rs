//! 事件总线
//!
//! 核心与展示层之间唯一的通信通道：核心发布，订阅者各自消费。
//! 没有订阅者时事件被丢弃，不算错误，上传流程不依赖有人在看。

use crate::events::UploadEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// 默认事件缓冲容量
const DEFAULT_CAPACITY: usize = 1024;

/// 上传事件总线
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UploadEvent>,
}

impl EventBus {
    /// 创建事件总线
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// 创建指定缓冲容量的事件总线
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 订阅事件流
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.tx.subscribe()
    }

    /// 发布事件
    pub fn publish(&self, event: UploadEvent) {
        trace!(
            "发布事件: type={}, task_id={:?}",
            event.event_type_name(),
            event.task_id()
        );
        // send 仅在没有任何订阅者时失败，忽略即可
        let _ = self.tx.send(event);
    }

    /// 当前订阅者数量
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
