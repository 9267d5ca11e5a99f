//! 基础设施层实现。
//!
//! 提供数据库仓储、会话通道路由、用户目录客户端和上传存储等适配器，
//! 实现应用/领域层定义的接口。

pub mod channel_router;
pub mod directory;
pub mod repository;
pub mod uploads;

pub use channel_router::{ChannelRoomRouter, SessionSender};
pub use directory::HttpUserDirectory;
pub use repository::{create_pg_pool, PgConversationRepository, PgMessageRepository};
pub use uploads::DiskUploadStorage;
