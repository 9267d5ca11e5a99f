//! 输入状态转发
//!
//! 无状态转发：收到什么负载就转发什么负载，目标是会话房间内
//! 除发送连接以外的成员。不校验负载里的用户身份。

use std::sync::Arc;

use domain::SessionId;

use crate::events::{ServerEvent, TypingPayload};
use crate::room_router::RoomRouter;

pub struct TypingRelay {
    router: Arc<dyn RoomRouter>,
}

impl TypingRelay {
    pub fn new(router: Arc<dyn RoomRouter>) -> Self {
        Self { router }
    }

    /// 转发"正在输入"。
    pub async fn relay_typing(&self, sender: SessionId, payload: TypingPayload) {
        self.router
            .broadcast_to_room(
                payload.conversation_id,
                ServerEvent::Typing(payload),
                Some(sender),
            )
            .await;
    }

    /// 转发"停止输入"。
    pub async fn relay_stop_typing(&self, sender: SessionId, payload: TypingPayload) {
        self.router
            .broadcast_to_room(
                payload.conversation_id,
                ServerEvent::StopTyping(payload),
                Some(sender),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use domain::{ConversationId, UserId};
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct CapturingRouter {
        broadcasts: Mutex<Vec<(ConversationId, ServerEvent, Option<SessionId>)>>,
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
            conversation_id: ConversationId,
            event: ServerEvent,
            exclude: Option<SessionId>,
        ) {
            self.broadcasts
                .lock()
                .unwrap()
                .push((conversation_id, event, exclude));
        }

        async fn send_to_session(&self, _session_id: SessionId, _event: ServerEvent) {}

        async fn broadcast_all(&self, _event: ServerEvent) {}
    }

    #[tokio::test]
    async fn relays_payload_verbatim_excluding_sender() {
        let router = Arc::new(CapturingRouter::default());
        let relay = TypingRelay::new(router.clone());
        let sender = SessionId::new(Uuid::from_u128(9));
        let payload = TypingPayload {
            conversation_id: ConversationId::new(Uuid::from_u128(1)),
            user_id: UserId::new(Uuid::from_u128(2)),
        };

        relay.relay_typing(sender, payload.clone()).await;
        relay.relay_stop_typing(sender, payload.clone()).await;

        let broadcasts = router.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 2);
        assert_eq!(broadcasts[0].0, payload.conversation_id);
        assert_eq!(broadcasts[0].1, ServerEvent::Typing(payload.clone()));
        assert_eq!(broadcasts[0].2, Some(sender));
        assert_eq!(broadcasts[1].1, ServerEvent::StopTyping(payload));
        assert_eq!(broadcasts[1].2, Some(sender));
    }
}
