//! 会话实体定义
//!
//! 会话是两名用户之间的唯一聊天通道。参与者以升序规范化存放，
//! 因此 (A, B) 与 (B, A) 指向同一条记录。

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{ConversationId, Timestamp, UserId};

/// 最新消息快照，用于会话列表的预览展示。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestMessage {
    /// 预览文本，附件消息使用固定的图片标记
    pub text: String,
    /// 最新消息的发送者
    pub sender_id: UserId,
}

/// 两名用户之间的会话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// 会话唯一标识
    pub id: ConversationId,
    /// 参与者，按标识升序存放
    pub participants: [UserId; 2],
    /// 最新消息快照，新会话为空
    pub latest_message: Option<LatestMessage>,
    /// 创建时间
    pub created_at: Timestamp,
    /// 更新时间，快照刷新时推进
    pub updated_at: Timestamp,
}

impl Conversation {
    /// 创建两名不同用户之间的新会话，参与者自动规范化为升序。
    pub fn between(a: UserId, b: UserId, now: Timestamp) -> DomainResult<Self> {
        if a == b {
            return Err(DomainError::validation_error(
                "participants",
                "conversation requires two distinct users",
            ));
        }

        Ok(Self {
            id: ConversationId::generate(),
            participants: Self::ordered(a, b),
            latest_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// 从存储记录恢复会话实体。
    pub fn with_id(
        id: ConversationId,
        a: UserId,
        b: UserId,
        latest_message: Option<LatestMessage>,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> DomainResult<Self> {
        if a == b {
            return Err(DomainError::business_rule_violation(
                "conversation participants must be distinct",
            ));
        }

        Ok(Self {
            id,
            participants: Self::ordered(a, b),
            latest_message,
            created_at,
            updated_at,
        })
    }

    fn ordered(a: UserId, b: UserId) -> [UserId; 2] {
        if a <= b {
            [a, b]
        } else {
            [b, a]
        }
    }

    /// 判断用户是否为会话参与者。
    pub fn is_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    /// 返回会话中的另一位参与者，非参与者得到 None。
    pub fn other_participant(&self, user: UserId) -> Option<UserId> {
        let [a, b] = self.participants;
        if user == a {
            Some(b)
        } else if user == b {
            Some(a)
        } else {
            None
        }
    }

    /// 刷新最新消息快照并推进更新时间。
    pub fn update_latest_message(&mut self, latest: LatestMessage, now: Timestamp) {
        self.latest_message = Some(latest);
        self.updated_at = now;
    }
}
