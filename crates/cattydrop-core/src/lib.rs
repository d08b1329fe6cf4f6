//! Cattydrop 核心库
//!
//! 局域网文件/消息互传服务的核心实现，供 cattydrop-server 使用。
//!
//! # 模块
//!
//! - **store**: 上传文件的落盘存储与内存注册表
//! - **messages**: 有界的聊天消息日志（FIFO 淘汰）
//! - **notify**: 状态变更事件的广播分发
//! - **sweep**: 后台保留期清理任务
//! - **config**: TOML 配置的读取与保存
//! - **net** / **qr**: 局域网地址探测与二维码生成

pub mod config;
pub mod messages;
pub mod net;
pub mod notify;
pub mod qr;
pub mod store;
pub mod sweep;

// Config re-exports
pub use config::AppConfig;

// Store re-exports
pub use store::{FileRecord, FileStore, StoreError};

// Message re-exports
pub use messages::{ChatMessage, MessageLog};

// Notify re-exports
pub use notify::{EVENT_CHANNEL_CAPACITY, Event, Notifier};

// Sweep re-exports
pub use sweep::RetentionSweeper;

// Helper re-exports
pub use net::local_ip;
pub use qr::qr_data_url;
