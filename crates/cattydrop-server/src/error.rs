//! 处理器错误到 HTTP 响应的转换
//!
//! 处理器统一返回 `Result<_, ApiError>`，任何失败都被转成
//! `{"error": "..."}` 的 JSON 响应，绝不终止进程。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cattydrop_core::StoreError;
use serde_json::json;

/// 处理器级错误
#[derive(Debug)]
pub enum ApiError {
    /// 请求形状不对：缺 file 字段、文件名为空等
    BadRequest(String),
    /// 未知 storageKey
    NotFound,
    /// 上传超过配置的大小上限
    PayloadTooLarge(u64),
    /// 存储写入失败或其他内部错误
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::PayloadTooLarge { limit } => ApiError::PayloadTooLarge(limit),
            StoreError::StorageWrite(e) => ApiError::Internal(format!("storage write failed: {e}")),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "File not found".to_string()),
            ApiError::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Upload exceeds the {limit} byte limit"),
            ),
            ApiError::Internal(message) => {
                tracing::error!("Handler error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
