//! 后台保留期清理
//!
//! 定时扫描文件存储，驱逐超过保留期的记录并清理孤儿 blob。
//! 循环永远不会让宿主进程崩溃：单条失败在 [`FileStore::evict_expired`]
//! 内部记日志跳过，整轮失败在这里记日志并缩短一次重试间隔，
//! 之后恢复正常节奏。

use std::sync::Arc;

use log::{error, info};
use tokio::task::JoinHandle;

use crate::store::FileStore;

/// 保留期清理任务
pub struct RetentionSweeper {
    store: Arc<FileStore>,
    ttl: chrono::Duration,
    interval: std::time::Duration,
    retry: std::time::Duration,
}

impl RetentionSweeper {
    pub fn new(
        store: Arc<FileStore>,
        ttl: chrono::Duration,
        interval: std::time::Duration,
        retry: std::time::Duration,
    ) -> Self {
        Self {
            store,
            ttl,
            interval,
            retry,
        }
    }

    /// 启动后台循环；通过返回的句柄可以取消任务
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        info!(
            "Retention sweeper running every {:?} (ttl {}s)",
            self.interval,
            self.ttl.num_seconds()
        );
        let mut retry_next = false;
        loop {
            let delay = if retry_next { self.retry } else { self.interval };
            retry_next = false;
            tokio::time::sleep(delay).await;

            match self.sweep_once().await {
                Ok((evicted, orphans)) => {
                    if evicted > 0 || orphans > 0 {
                        info!(
                            "Sweep evicted {} expired file(s), removed {} orphan(s)",
                            evicted, orphans
                        );
                    }
                }
                Err(e) => {
                    error!("Sweep cycle failed: {}, retrying in {:?}", e, self.retry);
                    retry_next = true;
                }
            }
        }
    }

    /// 单次清理：先按保留期驱逐记录，再清理孤儿 blob
    pub async fn sweep_once(&self) -> anyhow::Result<(usize, usize)> {
        let evicted = self.store.evict_expired(self.ttl).await;
        let orphans = self.store.remove_orphans(self.ttl).await?;
        Ok((evicted, orphans))
    }
}
