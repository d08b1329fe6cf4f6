//! Cattydrop HTTP/WebSocket 服务端
//!
//! 把核心库的文件存储、消息日志和事件广播接到 axum 路由上：
//!
//! - **routes**: HTTP 路由与处理器（上传/下载/列表/消息）
//! - **ws**: WebSocket 实时通道（事件下发 + send_message 上行）
//! - **state**: 处理器共享的应用状态
//! - **error**: 处理器错误到 HTTP 响应的统一转换

pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use routes::router;
pub use state::AppState;
