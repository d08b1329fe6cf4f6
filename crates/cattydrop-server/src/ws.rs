//! WebSocket 实时通道
//!
//! 每个连接一个任务：下行转发广播事件，上行接收 `send_message`。
//! 一个连接掉线或卡住只影响它自己的接收端，不会阻塞其他客户端。

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// 客户端上行事件，格式与下行事件对称: `{"event": ..., "data": ...}`
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
enum ClientEvent {
    SendMessage { text: String },
}

/// `GET /ws` 升级入口
pub async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle(socket, peer, state))
}

async fn handle(socket: WebSocket, peer: SocketAddr, state: Arc<AppState>) {
    debug!("WebSocket client connected: {}", peer);
    let (mut sink, mut stream) = socket.split();
    let mut events = state.notifier.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if sink.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                // 跟不上广播节奏的客户端丢最旧的事件，继续活着
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client {} lagged, skipped {} event(s)", peer, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(ClientEvent::SendMessage { text }) => {
                        // 服务端打 id/时间戳/发送者，append 自己会广播 new_message
                        state.messages.append(text, peer.ip().to_string()).await;
                    }
                    Err(e) => debug!("Ignoring malformed client event from {}: {}", peer, e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("WebSocket read error from {}: {}", peer, e);
                    break;
                }
            },
        }
    }
    debug!("WebSocket client disconnected: {}", peer);
}
