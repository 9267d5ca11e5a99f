use std::sync::Arc;

use domain::{
    Conversation, ConversationId, ConversationRepository, DomainError, LatestMessage, Message,
    MessageOrder, MessageRepository, RepositoryError, UserId,
};
use uuid::Uuid;

use crate::{
    clock::Clock,
    directory::{profile_or_placeholder, UserDirectory, UserProfile},
    error::ApplicationError,
    events::{MessagesSeenPayload, ServerEvent},
    room_router::RoomRouter,
    session_registry::SessionRegistry,
    uploads::StoredUpload,
};

#[derive(Debug, Clone)]
pub struct CreateConversationRequest {
    pub initiator_id: Uuid, // 发起人（从JWT获取）
    pub peer_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub conversation_id: Uuid,
    pub sender_id: Uuid, // 发送者（从JWT获取）
    pub text: Option<String>,
    pub attachment: Option<StoredUpload>,
}

#[derive(Debug, Clone)]
pub struct OpenConversationRequest {
    pub conversation_id: Uuid,
    pub user_id: Uuid, // 阅读者（从JWT获取）
}

/// 创建会话的结果，existing 的会话直接复用。
#[derive(Debug, Clone)]
pub struct CreateConversationOutcome {
    pub conversation: Conversation,
    /// 本次调用是否真正新建
    pub created: bool,
}

/// 会话列表中的一项。
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    /// 对方的资料，目录故障时为占位资料
    pub counterpart: UserProfile,
    /// 对方发来且本人未读的消息数
    pub unseen_count: u64,
}

/// 打开会话后的视图，消息按时间升序。
#[derive(Debug, Clone)]
pub struct ConversationView {
    pub messages: Vec<Message>,
    pub counterpart: UserProfile,
}

pub struct ChatServiceDependencies {
    pub conversation_repository: Arc<dyn ConversationRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub session_registry: Arc<SessionRegistry>,
    pub room_router: Arc<dyn RoomRouter>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub clock: Arc<dyn Clock>,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    /// 创建或返回两名用户之间的会话。对同一对用户幂等，
    /// 并发创建由唯一索引兜底。
    pub async fn create_conversation(
        &self,
        request: CreateConversationRequest,
    ) -> Result<CreateConversationOutcome, ApplicationError> {
        let initiator = UserId::from(request.initiator_id);
        let peer = UserId::from(request.peer_id);

        if let Some(existing) = self
            .deps
            .conversation_repository
            .find_by_participants(initiator, peer)
            .await?
        {
            return Ok(CreateConversationOutcome {
                conversation: existing,
                created: false,
            });
        }

        let now = self.deps.clock.now();
        let conversation = Conversation::between(initiator, peer, now)?;

        match self.deps.conversation_repository.create(conversation).await {
            Ok(created) => Ok(CreateConversationOutcome {
                conversation: created,
                created: true,
            }),
            Err(RepositoryError::Conflict { .. }) => {
                // 并发创建撞到唯一索引，读取已有记录保持幂等
                let existing = self
                    .deps
                    .conversation_repository
                    .find_by_participants(initiator, peer)
                    .await?
                    .ok_or_else(|| {
                        ApplicationError::from(DomainError::resource_not_found(
                            "conversation",
                            format!("{initiator}:{peer}"),
                        ))
                    })?;
                Ok(CreateConversationOutcome {
                    conversation: existing,
                    created: false,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// 本人参与的全部会话，按最近更新排序，附带对方资料与未读数。
    pub async fn list_conversations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, ApplicationError> {
        let user = UserId::from(user_id);
        let conversations = self
            .deps
            .conversation_repository
            .list_for_user(user)
            .await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let counterpart_id = match conversation.other_participant(user) {
                Some(id) => id,
                None => continue,
            };

            let counterpart =
                profile_or_placeholder(self.deps.user_directory.as_ref(), counterpart_id).await;
            let unseen_count = self
                .deps
                .message_repository
                .count_unseen(conversation.id, user)
                .await?;

            summaries.push(ConversationSummary {
                conversation,
                counterpart,
                unseen_count,
            });
        }

        Ok(summaries)
    }

    /// 发送消息。接收方当前连接已加入会话房间时，消息落库即带
    /// 已读标记，并立刻回告发送方。
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let conversation_id = ConversationId::from(request.conversation_id);
        let sender_id = UserId::from(request.sender_id);

        let attachment = request.attachment.map(StoredUpload::into_attachment);
        let now = self.deps.clock.now();
        let mut message = Message::new(conversation_id, sender_id, request.text, attachment, now)?;

        let conversation = self
            .deps
            .conversation_repository
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| {
                DomainError::resource_not_found("conversation", conversation_id.to_string())
            })?;

        let recipient_id = conversation
            .other_participant(sender_id)
            .ok_or_else(|| DomainError::permission_denied("send message in this conversation"))?;

        // 先查登记表再查房间；两次读之间断开的连接会在房间检查时落空
        let recipient_in_room = match self.deps.session_registry.lookup(recipient_id).await {
            Some(session) => {
                self.deps
                    .room_router
                    .is_session_in_room(session, conversation_id)
                    .await
            }
            None => false,
        };
        if recipient_in_room {
            message.mark_seen(now);
        }

        let stored = self.deps.message_repository.create(message).await?;

        let latest = LatestMessage {
            text: stored.preview_text(),
            sender_id,
        };
        if let Err(err) = self
            .deps
            .conversation_repository
            .update_latest_message(conversation_id, latest, now)
            .await
        {
            tracing::warn!(
                conversation_id = %conversation_id,
                message_id = %stored.id,
                error = %err,
                "消息已保存，但最新消息快照更新失败"
            );
        }

        self.deps
            .room_router
            .broadcast_to_room(conversation_id, ServerEvent::NewMessage(stored.clone()), None)
            .await;

        // 双方在线但不在房间时补发点对点副本
        for user in [sender_id, recipient_id] {
            if let Some(session) = self.deps.session_registry.lookup(user).await {
                if !self
                    .deps
                    .room_router
                    .is_session_in_room(session, conversation_id)
                    .await
                {
                    self.deps
                        .room_router
                        .send_to_session(session, ServerEvent::NewMessage(stored.clone()))
                        .await;
                }
            }
        }

        if stored.seen {
            if let Some(sender_session) = self.deps.session_registry.lookup(sender_id).await {
                self.deps
                    .room_router
                    .send_to_session(
                        sender_session,
                        ServerEvent::MessagesSeen(MessagesSeenPayload {
                            conversation_id,
                            seen_by: recipient_id,
                            message_ids: vec![stored.id],
                        }),
                    )
                    .await;
            }
        }

        Ok(stored)
    }

    /// 打开会话：把对方发来的未读消息全部置为已读，返回按时间
    /// 升序的完整消息列表。没有消息翻转时不发送任何通知。
    pub async fn open_conversation(
        &self,
        request: OpenConversationRequest,
    ) -> Result<ConversationView, ApplicationError> {
        let conversation_id = ConversationId::from(request.conversation_id);
        let user_id = UserId::from(request.user_id);

        let conversation = self
            .deps
            .conversation_repository
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| {
                DomainError::resource_not_found("conversation", conversation_id.to_string())
            })?;

        let counterpart_id = conversation
            .other_participant(user_id)
            .ok_or_else(|| DomainError::permission_denied("open this conversation"))?;

        let now = self.deps.clock.now();
        let flipped = self
            .deps
            .message_repository
            .mark_conversation_seen(conversation_id, user_id, now)
            .await?;

        let messages = self
            .deps
            .message_repository
            .list_by_conversation(conversation_id, MessageOrder::OldestFirst)
            .await?;

        if !flipped.is_empty() {
            if let Some(counterpart_session) =
                self.deps.session_registry.lookup(counterpart_id).await
            {
                self.deps
                    .room_router
                    .send_to_session(
                        counterpart_session,
                        ServerEvent::MessagesSeen(MessagesSeenPayload {
                            conversation_id,
                            seen_by: user_id,
                            message_ids: flipped,
                        }),
                    )
                    .await;
            }
        }

        let counterpart =
            profile_or_placeholder(self.deps.user_directory.as_ref(), counterpart_id).await;

        Ok(ConversationView {
            messages,
            counterpart,
        })
    }
}
