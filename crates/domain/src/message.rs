//! 消息实体定义
//!
//! 消息属于某个会话，正文可以是文本、附件或两者兼有。
//! 已读标记与已读时间必须成对出现，该约束在构造与恢复时均被校验。

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{ConversationId, MessageId, Timestamp, UserId};

/// 消息附件，指向上传存储中的对象。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// 对外可访问的地址
    pub url: String,
    /// 存储侧的定位标识，删除与审计时使用
    pub storage_ref: String,
}

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// 从存储的类型标记解析。
    pub fn parse(value: &str) -> DomainResult<Self> {
        match value {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(DomainError::validation_error(
                "kind",
                format!("unknown message kind: {other}"),
            )),
        }
    }
}

/// 会话内的一条消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// 消息唯一标识
    pub id: MessageId,
    /// 所属会话
    pub conversation_id: ConversationId,
    /// 发送者
    pub sender_id: UserId,
    /// 文本正文，可为空
    pub text: Option<String>,
    /// 附件，可为空
    pub attachment: Option<Attachment>,
    /// 消息类型，带附件时为 image
    pub kind: MessageKind,
    /// 接收方是否已读
    pub seen: bool,
    /// 已读时间，与 seen 成对出现
    pub seen_at: Option<Timestamp>,
    /// 创建时间
    pub created_at: Timestamp,
}

impl Message {
    /// 创建一条新消息。文本会被裁剪，正文与附件至少提供其一。
    pub fn new(
        conversation_id: ConversationId,
        sender_id: UserId,
        text: Option<String>,
        attachment: Option<Attachment>,
        now: Timestamp,
    ) -> DomainResult<Self> {
        let text = text
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        if text.is_none() && attachment.is_none() {
            return Err(DomainError::validation_error(
                "content",
                "message requires text or an attachment",
            ));
        }

        let kind = if attachment.is_some() {
            MessageKind::Image
        } else {
            MessageKind::Text
        };

        Ok(Self {
            id: MessageId::generate(),
            conversation_id,
            sender_id,
            text,
            attachment,
            kind,
            seen: false,
            seen_at: None,
            created_at: now,
        })
    }

    /// 从存储记录恢复消息实体，校验已读标记与类型约束。
    #[allow(clippy::too_many_arguments)]
    pub fn with_id(
        id: MessageId,
        conversation_id: ConversationId,
        sender_id: UserId,
        text: Option<String>,
        attachment: Option<Attachment>,
        kind: MessageKind,
        seen: bool,
        seen_at: Option<Timestamp>,
        created_at: Timestamp,
    ) -> DomainResult<Self> {
        if seen != seen_at.is_some() {
            return Err(DomainError::business_rule_violation(
                "seen flag must pair with seen timestamp",
            ));
        }
        if text.is_none() && attachment.is_none() {
            return Err(DomainError::business_rule_violation(
                "message requires text or an attachment",
            ));
        }
        if (kind == MessageKind::Image) != attachment.is_some() {
            return Err(DomainError::business_rule_violation(
                "image kind must pair with an attachment",
            ));
        }

        Ok(Self {
            id,
            conversation_id,
            sender_id,
            text,
            attachment,
            kind,
            seen,
            seen_at,
            created_at,
        })
    }

    /// 标记为已读。重复调用不改变首次的已读时间。
    pub fn mark_seen(&mut self, now: Timestamp) {
        if self.seen {
            return;
        }
        self.seen = true;
        self.seen_at = Some(now);
    }

    /// 会话列表使用的预览文本，附件消息使用图片标记。
    pub fn preview_text(&self) -> String {
        match self.kind {
            MessageKind::Image => match self.text.as_deref() {
                Some(caption) => format!("🖼️ image {caption}"),
                None => "🖼️ image".to_string(),
            },
            MessageKind::Text => self.text.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn conversation_id() -> ConversationId {
        ConversationId::new(Uuid::from_u128(10))
    }

    fn sender() -> UserId {
        UserId::new(Uuid::from_u128(1))
    }

    fn attachment() -> Attachment {
        Attachment {
            url: "https://files.example.com/uploads/a.png".to_string(),
            storage_ref: "uploads/a.png".to_string(),
        }
    }

    #[test]
    fn new_trims_text_and_requires_content() {
        let now = Utc::now();

        let message =
            Message::new(conversation_id(), sender(), Some("  hi  ".into()), None, now).unwrap();
        assert_eq!(message.text.as_deref(), Some("hi"));
        assert_eq!(message.kind, MessageKind::Text);
        assert!(!message.seen);
        assert!(message.seen_at.is_none());

        let empty = Message::new(conversation_id(), sender(), Some("   ".into()), None, now);
        assert!(matches!(empty, Err(DomainError::ValidationError { .. })));

        let nothing = Message::new(conversation_id(), sender(), None, None, now);
        assert!(matches!(nothing, Err(DomainError::ValidationError { .. })));
    }

    #[test]
    fn attachment_sets_image_kind() {
        let now = Utc::now();

        let message =
            Message::new(conversation_id(), sender(), None, Some(attachment()), now).unwrap();

        assert_eq!(message.kind, MessageKind::Image);
        assert!(message.text.is_none());
    }

    #[test]
    fn mark_seen_keeps_first_timestamp() {
        let now = Utc::now();
        let later = now + chrono::Duration::seconds(5);
        let mut message =
            Message::new(conversation_id(), sender(), Some("hi".into()), None, now).unwrap();

        message.mark_seen(now);
        message.mark_seen(later);

        assert!(message.seen);
        assert_eq!(message.seen_at, Some(now));
    }

    #[test]
    fn with_id_rejects_unpaired_seen_state() {
        let now = Utc::now();

        let missing_timestamp = Message::with_id(
            MessageId::generate(),
            conversation_id(),
            sender(),
            Some("hi".into()),
            None,
            MessageKind::Text,
            true,
            None,
            now,
        );
        assert!(matches!(
            missing_timestamp,
            Err(DomainError::BusinessRuleViolation { .. })
        ));

        let orphan_timestamp = Message::with_id(
            MessageId::generate(),
            conversation_id(),
            sender(),
            Some("hi".into()),
            None,
            MessageKind::Text,
            false,
            Some(now),
            now,
        );
        assert!(matches!(
            orphan_timestamp,
            Err(DomainError::BusinessRuleViolation { .. })
        ));
    }

    #[test]
    fn with_id_rejects_kind_attachment_mismatch() {
        let now = Utc::now();

        let image_without_attachment = Message::with_id(
            MessageId::generate(),
            conversation_id(),
            sender(),
            Some("hi".into()),
            None,
            MessageKind::Image,
            false,
            None,
            now,
        );

        assert!(matches!(
            image_without_attachment,
            Err(DomainError::BusinessRuleViolation { .. })
        ));
    }

    #[test]
    fn preview_text_marks_attachments() {
        let now = Utc::now();

        let plain =
            Message::new(conversation_id(), sender(), Some("hello".into()), None, now).unwrap();
        assert_eq!(plain.preview_text(), "hello");

        let bare_image =
            Message::new(conversation_id(), sender(), None, Some(attachment()), now).unwrap();
        assert_eq!(bare_image.preview_text(), "🖼️ image");

        let captioned = Message::new(
            conversation_id(),
            sender(),
            Some("look".into()),
            Some(attachment()),
            now,
        )
        .unwrap();
        assert_eq!(captioned.preview_text(), "🖼️ image look");
    }
}
