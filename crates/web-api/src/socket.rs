//! WebSocket 连接管理
//!
//! 每条连接分配一个会话标识并在路由器登记发送端。握手携带可用的
//! userId 时写入在线登记表并广播在线列表；缺失、为 "null" 或无法
//! 解析时按匿名连接处理，可以收事件、进房间，但不进入在线列表。

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use application::{ClientEvent, RoomRouter};
use domain::{SessionId, UserId};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct WsQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

pub(crate) async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

/// 解析握手里的用户标识，解析不出就按匿名处理。
fn parse_identity(raw: Option<&str>) -> Option<UserId> {
    let raw = raw?;
    if raw == "null" {
        return None;
    }
    match raw.parse::<Uuid>() {
        Ok(id) => Some(UserId::from(id)),
        Err(_) => {
            tracing::warn!(user_id = %raw, "无法解析的用户标识，按匿名连接处理");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, query: WsQuery) {
    let session_id = SessionId::generate();
    let identity = parse_identity(query.user_id.as_deref());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    state.room_router.attach(session_id, event_tx).await;

    if let Some(user_id) = identity {
        if let Some(old) = state.session_registry.register(user_id, session_id).await {
            tracing::info!(
                user_id = %user_id,
                old_session = %old,
                new_session = %session_id,
                "用户重连，旧连接的绑定被替换"
            );
        }
        tracing::info!(user_id = %user_id, session_id = %session_id, "WebSocket 连接已建立");
        state.presence.publish().await;
    } else {
        tracing::info!(session_id = %session_id, "匿名 WebSocket 连接已建立");
    }

    let (mut sender, mut incoming) = socket.split();

    // 发送任务：把路由器投递的事件写入 socket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize websocket payload");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // 接收任务：解析客户端事件并分发
    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = incoming.next().await {
            match frame {
                WsMessage::Text(raw) => {
                    handle_client_frame(&recv_state, session_id, raw.as_str()).await;
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    // 任一方向结束即视为连接断开
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.room_router.detach(session_id).await;
    // 只有绑定仍指向本连接时登记才会被清除；被新连接顶替后的
    // 旧连接在这里拿到 None，不触发在线列表广播
    if let Some(user_id) = state.session_registry.unregister(session_id).await {
        tracing::info!(user_id = %user_id, session_id = %session_id, "WebSocket 连接已断开");
        state.presence.publish().await;
    } else {
        tracing::debug!(session_id = %session_id, "连接断开，无在线状态需要清理");
    }
}

/// 处理客户端帧，无法解析的帧记录告警后丢弃，连接保持。
async fn handle_client_frame(state: &AppState, session_id: SessionId, raw: &str) {
    let event = match serde_json::from_str::<ClientEvent>(raw) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(session_id = %session_id, error = %err, "无法解析的客户端事件，丢弃该帧");
            return;
        }
    };

    match event {
        ClientEvent::JoinChat(conversation_id) => {
            state.room_router.join(session_id, conversation_id).await;
            tracing::debug!(session_id = %session_id, conversation_id = %conversation_id, "连接加入会话房间");
        }
        ClientEvent::LeaveChat(conversation_id) => {
            state.room_router.leave(session_id, conversation_id).await;
            tracing::debug!(session_id = %session_id, conversation_id = %conversation_id, "连接离开会话房间");
        }
        ClientEvent::Typing(payload) => {
            state.typing_relay.relay_typing(session_id, payload).await;
        }
        ClientEvent::StopTyping(payload) => {
            state.typing_relay.relay_stop_typing(session_id, payload).await;
        }
    }
}
