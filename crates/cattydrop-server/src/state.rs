//! 处理器共享的应用状态

use std::sync::Arc;

use cattydrop_core::{AppConfig, FileStore, MessageLog, Notifier};

/// 全部处理器和后台任务共享的状态
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<FileStore>,
    pub messages: MessageLog,
    pub notifier: Notifier,
}

impl AppState {
    /// 按配置初始化存储、消息日志和广播通道
    pub async fn new(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let notifier = Notifier::default();
        let store = Arc::new(
            FileStore::open(
                config.upload_dir.clone(),
                config.max_upload_bytes,
                notifier.clone(),
            )
            .await?,
        );
        let messages = MessageLog::new(config.message_capacity, notifier.clone());

        Ok(Arc::new(Self {
            config,
            store,
            messages,
            notifier,
        }))
    }
}
