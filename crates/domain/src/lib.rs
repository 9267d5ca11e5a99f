//! 领域层。
//!
//! 定义会话与消息实体、统一的标识与时间戳类型、
//! 分层错误以及存储端口。该层不依赖任何具体基础设施。

pub mod conversation;
pub mod errors;
pub mod message;
pub mod repository;
pub mod value_objects;

pub use conversation::{Conversation, LatestMessage};
pub use errors::{DomainError, DomainResult, RepositoryError};
pub use message::{Attachment, Message, MessageKind};
pub use repository::{
    ConversationRepository, MessageOrder, MessageRepository, RepositoryFuture, RepositoryResult,
};
pub use value_objects::{ConversationId, MessageId, SessionId, Timestamp, UserId};
