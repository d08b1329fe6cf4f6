//! HTTP 路由与处理器
//!
//! 路由只做请求解析和响应序列化，状态变更全部走核心库的契约。

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::Router;
use cattydrop_core::{ChatMessage, FileRecord, local_ip, qr_data_url};
use futures_util::TryStreamExt;
use serde_json::json;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::ApiError;
use crate::state::AppState;
use crate::ws;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

/// 构建完整的应用路由
pub fn router(state: Arc<AppState>) -> Router {
    // 给 multipart 边界和头部留一点富余
    let body_limit = state.config.max_upload_bytes as usize + 64 * 1024;

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/download/:storage_key", get(download))
        .route("/files", get(list_files))
        .route("/delete/:storage_key", delete(delete_file))
        .route("/messages", get(messages))
        .route("/clear_messages", post(clear_messages))
        .route("/ws", get(ws::upgrade))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// 首页：带局域网地址、端口、访问 URL 和内联二维码
async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let ip = local_ip();
    let url = format!("http://{}:{}", ip, state.config.port);
    let qr_code = qr_data_url(&url)?;

    let page = INDEX_TEMPLATE
        .replace("{{device_name}}", &state.config.device_name)
        .replace("{{local_ip}}", &ip.to_string())
        .replace("{{port}}", &state.config.port.to_string())
        .replace("{{url}}", &url)
        .replace("{{qr_code}}", &qr_code);
    Ok(Html(page))
}

/// `POST /upload` - multipart 表单的 `file` 字段
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().map(str::to_string).unwrap_or_default();
        if original_name.is_empty() {
            return Err(ApiError::BadRequest("No file selected".to_string()));
        }

        // 字段流直接接到存储层，不在内存里攒整个文件
        let body = field.map_err(|err| std::io::Error::other(err));
        let reader = StreamReader::new(body);
        let mut reader = std::pin::pin!(reader);
        let record = state.store.put(&original_name, &mut reader).await?;

        return Ok(Json(json!({
            "success": true,
            "storageKey": record.storage_key,
            "originalName": record.original_name,
            "sizeBytes": record.size_bytes,
        })));
    }
    Err(ApiError::BadRequest("No file provided".to_string()))
}

/// `GET /download/{storageKey}` - 以附件形式流式返回 blob
async fn download(
    State(state): State<Arc<AppState>>,
    Path(storage_key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (record, file) = state.store.get(&storage_key).await?;

    let mime = mime_guess::from_path(&record.original_name).first_or_octet_stream();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        record.original_name.replace('"', "_")
    );
    let headers = [
        (header::CONTENT_TYPE, mime.to_string()),
        (header::CONTENT_LENGTH, record.size_bytes.to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))))
}

/// `GET /files` - 当前注册表快照
async fn list_files(State(state): State<Arc<AppState>>) -> Json<Vec<FileRecord>> {
    Json(state.store.list().await)
}

/// `DELETE /delete/{storageKey}`
async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(storage_key): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.delete(&storage_key).await?;
    Ok(Json(json!({ "success": true })))
}

/// `GET /messages` - 插入顺序的消息快照
async fn messages(State(state): State<Arc<AppState>>) -> Json<Vec<ChatMessage>> {
    Json(state.messages.all().await)
}

/// `POST /clear_messages`
async fn clear_messages(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.messages.clear().await;
    Json(json!({ "success": true }))
}
