//! 进程内房间路由实现
//!
//! 每个连接在建立时登记一个无界发送端，事件投递就是向这些发送端
//! 写入。发送端已关闭时事件被静默丢弃，路由器不感知传输细节。

use std::collections::{HashMap, HashSet};

use application::{RoomRouter, ServerEvent};
use async_trait::async_trait;
use domain::{ConversationId, SessionId};
use tokio::sync::{mpsc, RwLock};

/// 连接的事件发送端。
pub type SessionSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Default)]
struct RouterState {
    senders: HashMap<SessionId, SessionSender>,
    rooms: HashMap<ConversationId, HashSet<SessionId>>,
    session_rooms: HashMap<SessionId, HashSet<ConversationId>>,
}

/// 基于进程内通道的房间路由器。
#[derive(Default)]
pub struct ChannelRoomRouter {
    state: RwLock<RouterState>,
}

impl ChannelRoomRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连接建立时登记发送端。
    pub async fn attach(&self, session_id: SessionId, sender: SessionSender) {
        self.state.write().await.senders.insert(session_id, sender);
    }

    /// 连接关闭时移除发送端以及全部房间成员关系。
    pub async fn detach(&self, session_id: SessionId) {
        let mut state = self.state.write().await;
        state.senders.remove(&session_id);
        if let Some(rooms) = state.session_rooms.remove(&session_id) {
            for room in rooms {
                let emptied = state
                    .rooms
                    .get_mut(&room)
                    .map(|members| {
                        members.remove(&session_id);
                        members.is_empty()
                    })
                    .unwrap_or(false);
                if emptied {
                    state.rooms.remove(&room);
                }
            }
        }
    }

    fn deliver(sender: &SessionSender, session_id: SessionId, event: ServerEvent) {
        if sender.send(event).is_err() {
            tracing::debug!(session_id = %session_id, "session channel closed, dropping event");
        }
    }
}

#[async_trait]
impl RoomRouter for ChannelRoomRouter {
    async fn join(&self, session_id: SessionId, conversation_id: ConversationId) {
        let mut state = self.state.write().await;
        // 未登记的连接不会留下孤儿成员关系
        if !state.senders.contains_key(&session_id) {
            return;
        }
        state
            .rooms
            .entry(conversation_id)
            .or_default()
            .insert(session_id);
        state
            .session_rooms
            .entry(session_id)
            .or_default()
            .insert(conversation_id);
    }

    async fn leave(&self, session_id: SessionId, conversation_id: ConversationId) {
        let mut state = self.state.write().await;
        let emptied = state
            .rooms
            .get_mut(&conversation_id)
            .map(|members| {
                members.remove(&session_id);
                members.is_empty()
            })
            .unwrap_or(false);
        if emptied {
            state.rooms.remove(&conversation_id);
        }
        let orphaned = state
            .session_rooms
            .get_mut(&session_id)
            .map(|rooms| {
                rooms.remove(&conversation_id);
                rooms.is_empty()
            })
            .unwrap_or(false);
        if orphaned {
            state.session_rooms.remove(&session_id);
        }
    }

    async fn is_session_in_room(
        &self,
        session_id: SessionId,
        conversation_id: ConversationId,
    ) -> bool {
        self.state
            .read()
            .await
            .rooms
            .get(&conversation_id)
            .is_some_and(|members| members.contains(&session_id))
    }

    async fn broadcast_to_room(
        &self,
        conversation_id: ConversationId,
        event: ServerEvent,
        exclude: Option<SessionId>,
    ) {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(&conversation_id) else {
            return;
        };
        for member in members {
            if Some(*member) == exclude {
                continue;
            }
            if let Some(sender) = state.senders.get(member) {
                Self::deliver(sender, *member, event.clone());
            }
        }
    }

    async fn send_to_session(&self, session_id: SessionId, event: ServerEvent) {
        let state = self.state.read().await;
        if let Some(sender) = state.senders.get(&session_id) {
            Self::deliver(sender, session_id, event);
        }
    }

    async fn broadcast_all(&self, event: ServerEvent) {
        let state = self.state.read().await;
        for (session_id, sender) in &state.senders {
            Self::deliver(sender, *session_id, event.clone());
        }
    }
}
