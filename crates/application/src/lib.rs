//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务与实时编排：在线登记、房间路由、
//! 在线状态发布、输入状态转发，以及对外部适配器（用户目录、上传
//! 存储、时钟）的抽象。

pub mod clock;
pub mod directory;
pub mod error;
pub mod events;
pub mod presence;
pub mod room_router;
pub mod services;
pub mod session_registry;
pub mod typing;
pub mod uploads;

pub use clock::{Clock, SystemClock};
pub use directory::{profile_or_placeholder, DirectoryError, UserDirectory, UserProfile};
pub use error::ApplicationError;
pub use events::{ClientEvent, MessagesSeenPayload, ServerEvent, TypingPayload};
pub use presence::PresencePublisher;
pub use room_router::RoomRouter;
pub use services::{
    ChatService, ChatServiceDependencies, ConversationSummary, ConversationView,
    CreateConversationOutcome, CreateConversationRequest, OpenConversationRequest,
    SendMessageRequest,
};
pub use session_registry::SessionRegistry;
pub use typing::TypingRelay;
pub use uploads::{StoredUpload, UploadError, UploadStorage};
