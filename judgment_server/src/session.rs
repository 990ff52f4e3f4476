use crate::gateway::Outbox;
use crate::registry::Registry;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use judgment_core::{ClientMessage, ConnectionId, GameError, ServerMessage};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SharedRegistry = Arc<Registry>;

/// 处理 WebSocket 连接请求
pub async fn websocket_handler(ws: WebSocketUpgrade, State(registry): State<SharedRegistry>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, registry))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, registry: SharedRegistry) {
    let connection: ConnectionId = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    // 房间把消息放进发件箱，这个任务按顺序写到 WebSocket
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });
    info!(%connection, "客户端已连接");

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => dispatch_text(&registry, connection, &tx, text.as_str()),
            Message::Close(_) => break,
            _ => {}
        }
    }

    // 客户端断开连接，座位交给宽限期处理
    registry.disconnect(connection);
    writer.abort();
    info!(%connection, "客户端连接关闭");
}

/// 解析一帧文本并交给房间注册表；格式错误只回给发送方
pub fn dispatch_text(registry: &SharedRegistry, connection: ConnectionId, outbox: &Outbox, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => registry.handle(connection, outbox, msg),
        Err(e) => {
            debug!(%connection, "解析消息失败: {}", e);
            let _ = outbox.send(GameError::MalformedMessage(e.to_string()).into());
        }
    }
}
