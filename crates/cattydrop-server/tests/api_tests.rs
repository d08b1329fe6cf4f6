//! 端到端 API 测试
//!
//! 在随机端口起一个完整服务，用 reqwest / tokio-tungstenite
//! 模拟浏览器客户端走完上传、下载、消息和实时通道的全流程。

use std::net::SocketAddr;
use std::sync::Arc;

use cattydrop_core::AppConfig;
use cattydrop_server::{AppState, router};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    base: String,
    _upload_dir: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    async fn spawn_with(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let upload_dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig {
            upload_dir: upload_dir.path().to_path_buf(),
            ..Default::default()
        };
        tweak(&mut config);

        let state = AppState::new(config).await.unwrap();
        let app = router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            _upload_dir: upload_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn connect_ws(&self) -> WsClient {
        let ws_url = self.base.replace("http://", "ws://") + "/ws";
        let (ws, _) = tokio_tungstenite::connect_async(ws_url).await.unwrap();
        ws
    }
}

async fn upload(client: &reqwest::Client, server: &TestServer, name: &str, bytes: &[u8]) -> Value {
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(name.to_string()),
    );
    client
        .post(server.url("/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn next_event(ws: &mut WsClient) -> Value {
    loop {
        match ws.next().await.expect("socket closed").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

/// 上传 10 字节的 a.txt，列表、下载、删除走完整个生命周期
#[tokio::test]
async fn test_upload_list_download_delete() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let body = upload(&client, &server, "a.txt", b"0123456789").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["originalName"], "a.txt");
    assert_eq!(body["sizeBytes"], 10);
    let storage_key = body["storageKey"].as_str().unwrap().to_string();

    let files: Value = client
        .get(server.url("/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let files = files.as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["originalName"], "a.txt");
    assert_eq!(files[0]["sizeBytes"], 10);
    assert_eq!(files[0]["downloadURL"], format!("/download/{storage_key}"));

    let download = client
        .get(server.url(&format!("/download/{storage_key}")))
        .send()
        .await
        .unwrap();
    assert_eq!(download.status(), 200);
    let disposition = download.headers()["content-disposition"].to_str().unwrap();
    assert!(disposition.contains("a.txt"));
    assert_eq!(download.bytes().await.unwrap().as_ref(), b"0123456789");

    let deleted: Value = client
        .delete(server.url(&format!("/delete/{storage_key}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["success"], true);

    // 删除后下载和再次删除都是 404
    assert_eq!(
        client
            .get(server.url(&format!("/download/{storage_key}")))
            .send()
            .await
            .unwrap()
            .status(),
        404
    );
    assert_eq!(
        client
            .delete(server.url(&format!("/delete/{storage_key}")))
            .send()
            .await
            .unwrap()
            .status(),
        404
    );
}

#[tokio::test]
async fn test_upload_without_file_part_is_bad_request() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().text("other", "x");
    let resp = client
        .post(server.url("/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "No file provided");

    // file 字段存在但没有文件名
    let form = reqwest::multipart::Form::new()
        .part("file", reqwest::multipart::Part::bytes(b"data".to_vec()));
    let resp = client
        .post(server.url("/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "No file selected");
}

#[tokio::test]
async fn test_oversized_upload_is_payload_too_large() {
    let server = TestServer::spawn_with(|config| config.max_upload_bytes = 16).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/upload"))
        .multipart(reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(vec![0u8; 64]).file_name("big.bin"),
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);

    // 失败的上传不留任何记录
    let files: Value = client
        .get(server.url("/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(files.as_array().unwrap().is_empty());
}

/// 通过 WebSocket 发 "hi" / "bye"，快照顺序与广播都符合约定
#[tokio::test]
async fn test_messages_over_websocket() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let mut ws = server.connect_ws().await;

    ws.send(Message::Text(
        r#"{"event":"send_message","data":{"text":"hi"}}"#.to_string(),
    ))
    .await
    .unwrap();
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "new_message");
    assert_eq!(event["data"]["text"], "hi");
    assert_eq!(event["data"]["sender"], "127.0.0.1");

    ws.send(Message::Text(
        r#"{"event":"send_message","data":{"text":"bye"}}"#.to_string(),
    ))
    .await
    .unwrap();
    let event = next_event(&mut ws).await;
    assert_eq!(event["data"]["text"], "bye");

    let messages: Value = client
        .get(server.url("/messages"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let texts: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["hi", "bye"]);

    // 清空后快照为空，且已连接客户端收到 messages_cleared
    let cleared: Value = client
        .post(server.url("/clear_messages"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["success"], true);
    let event = next_event(&mut ws).await;
    assert_eq!(event["event"], "messages_cleared");

    let messages: Value = client
        .get(server.url("/messages"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(messages.as_array().unwrap().is_empty());
}

/// 两个已连接客户端按提交顺序观察到同一串事件
#[tokio::test]
async fn test_broadcast_order_across_clients() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let mut first = server.connect_ws().await;
    let mut second = server.connect_ws().await;

    let body = upload(&client, &server, "a.txt", b"0123456789").await;
    let storage_key = body["storageKey"].as_str().unwrap().to_string();
    first
        .send(Message::Text(
            r#"{"event":"send_message","data":{"text":"hello"}}"#.to_string(),
        ))
        .await
        .unwrap();
    // 等消息提交后再删除，保证全局顺序确定
    let event = next_event(&mut first).await;
    assert_eq!(event["event"], "file_uploaded");
    let event = next_event(&mut first).await;
    assert_eq!(event["event"], "new_message");
    client
        .delete(server.url(&format!("/delete/{storage_key}")))
        .send()
        .await
        .unwrap();
    let event = next_event(&mut first).await;
    assert_eq!(event["event"], "file_deleted");
    assert_eq!(event["data"]["storageKey"], storage_key);

    // 第二个客户端看到完全相同的顺序
    let event = next_event(&mut second).await;
    assert_eq!(event["event"], "file_uploaded");
    assert_eq!(event["data"]["storageKey"], storage_key);
    assert_eq!(event["data"]["downloadURL"], format!("/download/{storage_key}"));
    let event = next_event(&mut second).await;
    assert_eq!(event["event"], "new_message");
    assert_eq!(event["data"]["text"], "hello");
    let event = next_event(&mut second).await;
    assert_eq!(event["event"], "file_deleted");
}

#[tokio::test]
async fn test_landing_page_embeds_qr_code() {
    let server = TestServer::spawn().await;
    let resp = reqwest::get(server.url("/")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let page = resp.text().await.unwrap();
    assert!(page.contains("data:image/png;base64,"));
    assert!(page.contains("/ws"));
}
