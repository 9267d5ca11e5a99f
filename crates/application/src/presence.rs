//! 在线状态发布
//!
//! 登记表每次发生有效变更后，向所有连接广播一次完整的在线用户
//! 列表。列表总是全量发送，客户端直接以其覆盖本地状态。

use std::sync::Arc;

use crate::events::ServerEvent;
use crate::room_router::RoomRouter;
use crate::session_registry::SessionRegistry;

pub struct PresencePublisher {
    registry: Arc<SessionRegistry>,
    router: Arc<dyn RoomRouter>,
}

impl PresencePublisher {
    pub fn new(registry: Arc<SessionRegistry>, router: Arc<dyn RoomRouter>) -> Self {
        Self { registry, router }
    }

    /// 广播当前完整在线列表。
    pub async fn publish(&self) {
        let online = self.registry.list_active().await;
        tracing::debug!(online = online.len(), "broadcasting online user list");
        self.router
            .broadcast_all(ServerEvent::GetOnlineUser(online))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use domain::{ConversationId, SessionId, UserId};
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct CapturingRouter {
        global: Mutex<Vec<ServerEvent>>,
    }

    #[async_trait]
    impl RoomRouter for CapturingRouter {
        async fn join(&self, _session_id: SessionId, _conversation_id: ConversationId) {}

        async fn leave(&self, _session_id: SessionId, _conversation_id: ConversationId) {}

        async fn is_session_in_room(
            &self,
            _session_id: SessionId,
            _conversation_id: ConversationId,
        ) -> bool {
            false
        }

        async fn broadcast_to_room(
            &self,
            _conversation_id: ConversationId,
            _event: ServerEvent,
            _exclude: Option<SessionId>,
        ) {
        }

        async fn send_to_session(&self, _session_id: SessionId, _event: ServerEvent) {}

        async fn broadcast_all(&self, event: ServerEvent) {
            self.global.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn publishes_full_sorted_list_to_everyone() {
        let registry = Arc::new(SessionRegistry::new());
        let router = Arc::new(CapturingRouter::default());
        let publisher = PresencePublisher::new(registry.clone(), router.clone());

        let low = UserId::new(Uuid::from_u128(1));
        let high = UserId::new(Uuid::from_u128(2));
        registry.register(high, SessionId::new(Uuid::from_u128(20))).await;
        registry.register(low, SessionId::new(Uuid::from_u128(10))).await;

        publisher.publish().await;

        let broadcasts = router.global.lock().unwrap();
        assert_eq!(
            broadcasts.as_slice(),
            [ServerEvent::GetOnlineUser(vec![low, high])]
        );
    }
}
