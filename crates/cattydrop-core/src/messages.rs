//! 聊天消息日志
//!
//! 进程级共享的有界消息环：超过容量时从最旧一端淘汰（FIFO），
//! 展示顺序就是插入顺序。没有持久化，进程退出即丢失。

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::notify::{Event, Notifier};

/// 一条聊天消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    /// 服务端收到时打的时间戳
    pub timestamp: DateTime<Utc>,
    /// 提交连接的来源地址
    pub sender: String,
}

/// 有界消息日志
pub struct MessageLog {
    capacity: usize,
    inner: Mutex<VecDeque<ChatMessage>>,
    notifier: Notifier,
}

impl MessageLog {
    pub fn new(capacity: usize, notifier: Notifier) -> Self {
        Self {
            capacity,
            inner: Mutex::new(VecDeque::new()),
            notifier,
        }
    }

    /// 追加一条消息，必要时从最旧一端截断
    ///
    /// 打时间戳、入队、截断、发事件在同一临界区内完成，
    /// 并发 append 不会交错破坏顺序或容量上限。
    pub async fn append(
        &self,
        text: impl Into<String>,
        sender: impl Into<String>,
    ) -> ChatMessage {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            text: text.into(),
            timestamp: Utc::now(),
            sender: sender.into(),
        };

        let mut log = self.inner.lock().await;
        log.push_back(message.clone());
        while log.len() > self.capacity {
            log.pop_front();
        }
        self.notifier.publish(Event::NewMessage(message.clone()));
        drop(log);

        message
    }

    /// 按插入顺序的快照
    pub async fn all(&self) -> Vec<ChatMessage> {
        self.inner.lock().await.iter().cloned().collect()
    }

    /// 无条件清空
    pub async fn clear(&self) {
        let mut log = self.inner.lock().await;
        log.clear();
        self.notifier.publish(Event::MessagesCleared);
    }
}
