//! 状态变更事件广播
//!
//! 文件注册表和消息日志的每次变更都会产生一个事件，
//! 通过 broadcast 通道扇出到所有已连接的 WebSocket 客户端。
//!
//! 投递是尽力而为的：掉线或跟不上的客户端不会阻塞其他客户端，
//! 也没有事件回放 —— 新连接的客户端靠 `/files` + `/messages` 全量同步。

use serde::Serialize;
use tokio::sync::broadcast;

use crate::messages::ChatMessage;
use crate::store::FileRecord;

/// 事件通道容量，超出后最慢的订阅者丢失最旧的事件
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// 一次状态变更的广播事件
///
/// 线上格式: `{"event": "<kind>", "data": <payload>}`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// 新文件上传完成，携带完整的文件记录投影
    FileUploaded(FileRecord),
    /// 文件被删除（用户操作或保留期清理），只携带 storageKey
    FileDeleted {
        #[serde(rename = "storageKey")]
        storage_key: String,
    },
    /// 新聊天消息
    NewMessage(ChatMessage),
    /// 消息日志被清空
    MessagesCleared,
}

/// 事件广播器
///
/// 克隆后仍指向同一底层通道；发布端在持有被变更结构的锁时发送，
/// 保证事件顺序与提交顺序一致。
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Event>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// 订阅事件流，只收到订阅之后发布的事件
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// 发布事件。没有订阅者时发送会失败，属正常情况，直接忽略。
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}
