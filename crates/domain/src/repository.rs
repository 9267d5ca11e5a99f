use futures::future::BoxFuture;

use crate::conversation::{Conversation, LatestMessage};
use crate::errors::RepositoryError;
use crate::message::Message;
use crate::value_objects::{ConversationId, MessageId, Timestamp, UserId};

pub type RepositoryResult<T> = Result<T, RepositoryError>;
pub type RepositoryFuture<T> = BoxFuture<'static, RepositoryResult<T>>;

/// 消息读取顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrder {
    OldestFirst,
    NewestFirst,
}

pub trait ConversationRepository: Send + Sync {
    fn create(&self, conversation: Conversation) -> RepositoryFuture<Conversation>;
    fn find_by_id(&self, id: ConversationId) -> RepositoryFuture<Option<Conversation>>;
    fn find_by_participants(&self, a: UserId, b: UserId) -> RepositoryFuture<Option<Conversation>>;
    fn list_for_user(&self, user: UserId) -> RepositoryFuture<Vec<Conversation>>;
    fn update_latest_message(
        &self,
        id: ConversationId,
        latest: LatestMessage,
        updated_at: Timestamp,
    ) -> RepositoryFuture<()>;
}

pub trait MessageRepository: Send + Sync {
    fn create(&self, message: Message) -> RepositoryFuture<Message>;
    fn list_by_conversation(
        &self,
        conversation_id: ConversationId,
        order: MessageOrder,
    ) -> RepositoryFuture<Vec<Message>>;
    fn count_unseen(&self, conversation_id: ConversationId, reader: UserId)
        -> RepositoryFuture<u64>;
    fn mark_conversation_seen(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        at: Timestamp,
    ) -> RepositoryFuture<Vec<MessageId>>;
}
