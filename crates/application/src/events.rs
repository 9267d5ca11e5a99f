//! 实时事件协议定义
//!
//! 客户端与服务端通过 `{ "event": <名称>, "data": <负载> }` 的 JSON
//! 信封交换事件，字段名统一使用 camelCase。

use domain::{ConversationId, Message, MessageId, UserId};
use serde::{Deserialize, Serialize};

/// 输入状态负载，转发时保持原样。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
}

/// 已读通知负载。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesSeenPayload {
    pub conversation_id: ConversationId,
    /// 完成阅读的一方
    pub seen_by: UserId,
    /// 本次被置为已读的消息
    pub message_ids: Vec<MessageId>,
}

/// 客户端发来的事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinChat(ConversationId),
    LeaveChat(ConversationId),
    Typing(TypingPayload),
    StopTyping(TypingPayload),
}

/// 服务端推送给客户端的事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// 完整的在线用户列表
    GetOnlineUser(Vec<UserId>),
    /// 新消息，携带完整消息记录
    NewMessage(Message),
    /// 已读通知
    MessagesSeen(MessagesSeenPayload),
    /// 输入状态转发
    Typing(TypingPayload),
    StopTyping(TypingPayload),
}
