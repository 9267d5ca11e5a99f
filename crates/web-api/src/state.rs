use std::sync::Arc;

use application::{ChatService, PresencePublisher, SessionRegistry, TypingRelay, UploadStorage};
use infrastructure::ChannelRoomRouter;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub session_registry: Arc<SessionRegistry>,
    // 具体路由器类型，连接生命周期需要 attach/detach
    pub room_router: Arc<ChannelRoomRouter>,
    pub presence: Arc<PresencePublisher>,
    pub typing_relay: Arc<TypingRelay>,
    pub upload_storage: Arc<dyn UploadStorage>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        chat_service: Arc<ChatService>,
        session_registry: Arc<SessionRegistry>,
        room_router: Arc<ChannelRoomRouter>,
        presence: Arc<PresencePublisher>,
        typing_relay: Arc<TypingRelay>,
        upload_storage: Arc<dyn UploadStorage>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            chat_service,
            session_registry,
            room_router,
            presence,
            typing_relay,
            upload_storage,
            jwt_service,
        }
    }
}
