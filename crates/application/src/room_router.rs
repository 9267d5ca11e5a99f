//! 房间路由端口
//!
//! 将在线连接编入以会话为粒度的房间，提供房间广播、全局广播与
//! 点对点投递。投递是尽力而为的：目标连接不存在时静默跳过，
//! 不影响调用方。

use async_trait::async_trait;
use domain::{ConversationId, SessionId};

use crate::events::ServerEvent;

#[async_trait]
pub trait RoomRouter: Send + Sync {
    /// 将连接加入会话房间，重复加入是幂等的。
    async fn join(&self, session_id: SessionId, conversation_id: ConversationId);

    /// 将连接移出会话房间，非成员时为空操作。
    async fn leave(&self, session_id: SessionId, conversation_id: ConversationId);

    /// 查询连接当前是否在会话房间内。
    async fn is_session_in_room(
        &self,
        session_id: SessionId,
        conversation_id: ConversationId,
    ) -> bool;

    /// 向房间内所有成员投递事件，可排除一个连接。
    async fn broadcast_to_room(
        &self,
        conversation_id: ConversationId,
        event: ServerEvent,
        exclude: Option<SessionId>,
    );

    /// 向单个连接投递事件，至多一次。
    async fn send_to_session(&self, session_id: SessionId, event: ServerEvent);

    /// 向所有在线连接投递事件。
    async fn broadcast_all(&self, event: ServerEvent);
}
