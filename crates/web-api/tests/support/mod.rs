//! 集成测试支撑：内存仓储加预置的用户目录，整套路由跑在真实
//! TCP 端口上，不依赖外部 PostgreSQL 和用户服务。

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use application::{
    ChatService, ChatServiceDependencies, Clock, DirectoryError, PresencePublisher, RoomRouter,
    SessionRegistry, StoredUpload, SystemClock, TypingRelay, UploadError, UploadStorage,
    UserDirectory, UserProfile,
};
use axum::Router;
use domain::{
    Conversation, ConversationId, ConversationRepository, LatestMessage, Message, MessageId,
    MessageOrder, MessageRepository, RepositoryError, RepositoryFuture, Timestamp, UserId,
};
use futures_util::StreamExt;
use infrastructure::ChannelRoomRouter;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use uuid::Uuid;
use web_api::{router as build_router_fn, AppState, JwtConfig, JwtService};

/// 所有测试共享的签名密钥，与用户服务共享密钥的部署方式一致。
const TEST_JWT_SECRET: &str = "integration-test-secret-key-0123456789abcdef";

#[derive(Default)]
struct InMemoryConversations {
    rows: Arc<Mutex<HashMap<ConversationId, Conversation>>>,
}

impl ConversationRepository for InMemoryConversations {
    fn create(&self, conversation: Conversation) -> RepositoryFuture<Conversation> {
        let rows = Arc::clone(&self.rows);
        Box::pin(async move {
            let mut rows = rows.lock().unwrap();
            if rows
                .values()
                .any(|existing| existing.participants == conversation.participants)
            {
                return Err(RepositoryError::conflict("conversation pair already exists"));
            }
            rows.insert(conversation.id, conversation.clone());
            Ok(conversation)
        })
    }

    fn find_by_id(&self, id: ConversationId) -> RepositoryFuture<Option<Conversation>> {
        let rows = Arc::clone(&self.rows);
        Box::pin(async move { Ok(rows.lock().unwrap().get(&id).cloned()) })
    }

    fn find_by_participants(&self, a: UserId, b: UserId) -> RepositoryFuture<Option<Conversation>> {
        let rows = Arc::clone(&self.rows);
        Box::pin(async move {
            Ok(rows
                .lock()
                .unwrap()
                .values()
                .find(|c| c.is_participant(a) && c.is_participant(b))
                .cloned())
        })
    }

    fn list_for_user(&self, user: UserId) -> RepositoryFuture<Vec<Conversation>> {
        let rows = Arc::clone(&self.rows);
        Box::pin(async move {
            let mut result: Vec<Conversation> = rows
                .lock()
                .unwrap()
                .values()
                .filter(|c| c.is_participant(user))
                .cloned()
                .collect();
            result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(result)
        })
    }

    fn update_latest_message(
        &self,
        id: ConversationId,
        latest: LatestMessage,
        updated_at: Timestamp,
    ) -> RepositoryFuture<()> {
        let rows = Arc::clone(&self.rows);
        Box::pin(async move {
            if let Some(conversation) = rows.lock().unwrap().get_mut(&id) {
                conversation.latest_message = Some(latest);
                conversation.updated_at = updated_at;
            }
            Ok(())
        })
    }
}

#[derive(Default)]
struct InMemoryMessages {
    rows: Arc<Mutex<Vec<Message>>>,
}

impl MessageRepository for InMemoryMessages {
    fn create(&self, message: Message) -> RepositoryFuture<Message> {
        let rows = Arc::clone(&self.rows);
        Box::pin(async move {
            rows.lock().unwrap().push(message.clone());
            Ok(message)
        })
    }

    fn list_by_conversation(
        &self,
        conversation_id: ConversationId,
        order: MessageOrder,
    ) -> RepositoryFuture<Vec<Message>> {
        let rows = Arc::clone(&self.rows);
        Box::pin(async move {
            let mut result: Vec<Message> = rows
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .cloned()
                .collect();
            result.sort_by_key(|m| m.created_at);
            if order == MessageOrder::NewestFirst {
                result.reverse();
            }
            Ok(result)
        })
    }

    fn count_unseen(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> RepositoryFuture<u64> {
        let rows = Arc::clone(&self.rows);
        Box::pin(async move {
            let count = rows
                .lock()
                .unwrap()
                .iter()
                .filter(|m| {
                    m.conversation_id == conversation_id && m.sender_id != reader && !m.seen
                })
                .count();
            Ok(count as u64)
        })
    }

    fn mark_conversation_seen(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        at: Timestamp,
    ) -> RepositoryFuture<Vec<MessageId>> {
        let rows = Arc::clone(&self.rows);
        Box::pin(async move {
            let mut flipped = Vec::new();
            for message in rows.lock().unwrap().iter_mut() {
                if message.conversation_id == conversation_id
                    && message.sender_id != reader
                    && !message.seen
                {
                    message.mark_seen(at);
                    flipped.push(message.id);
                }
            }
            Ok(flipped)
        })
    }
}

/// 预置名单的用户目录，名单之外的用户返回不可用。
struct StaticDirectory {
    names: HashMap<UserId, String>,
}

#[async_trait::async_trait]
impl UserDirectory for StaticDirectory {
    async fn fetch_profile(&self, id: UserId) -> Result<UserProfile, DirectoryError> {
        match self.names.get(&id) {
            Some(name) => Ok(UserProfile {
                id,
                display_name: name.clone(),
            }),
            None => Err(DirectoryError::unavailable("user not in test directory")),
        }
    }
}

/// 不落盘的附件存储，URL 直接由文件名拼出。
#[derive(Default)]
struct MemoryUploads;

#[async_trait::async_trait]
impl UploadStorage for MemoryUploads {
    async fn store(&self, filename: &str, _bytes: Vec<u8>) -> Result<StoredUpload, UploadError> {
        Ok(StoredUpload {
            url: format!("http://files.test/{filename}"),
            storage_ref: filename.to_string(),
        })
    }
}

/// 组装跑在内存后端上的完整路由，`users` 为目录里已知的用户。
pub fn build_router(users: &[(Uuid, &str)]) -> Router {
    let registry = Arc::new(SessionRegistry::new());
    let room_router = Arc::new(ChannelRoomRouter::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());
    let directory = StaticDirectory {
        names: users
            .iter()
            .map(|(id, name)| (UserId::new(*id), name.to_string()))
            .collect(),
    };

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        conversation_repository: Arc::new(InMemoryConversations::default()),
        message_repository: Arc::new(InMemoryMessages::default()),
        session_registry: Arc::clone(&registry),
        room_router: Arc::clone(&room_router) as Arc<dyn RoomRouter>,
        user_directory: Arc::new(directory),
        clock,
    }));

    let presence = Arc::new(PresencePublisher::new(
        Arc::clone(&registry),
        Arc::clone(&room_router) as Arc<dyn RoomRouter>,
    ));
    let typing_relay = Arc::new(TypingRelay::new(
        Arc::clone(&room_router) as Arc<dyn RoomRouter>,
    ));
    let jwt_service = Arc::new(JwtService::new(JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        expiration_hours: 24,
    }));

    let state = AppState::new(
        chat_service,
        registry,
        room_router,
        presence,
        typing_relay,
        Arc::new(MemoryUploads),
        jwt_service,
    );

    build_router_fn(state)
}

/// 为指定用户签发测试令牌，与服务端共享同一密钥。
pub fn bearer_token(user: Uuid) -> String {
    let jwt = JwtService::new(JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        expiration_hours: 24,
    });
    jwt.generate_token(user).expect("sign test token")
}

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 读取下一条文本事件，超时视为失败。
pub async fn next_event(ws: &mut WsClient) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("等待服务端事件超时")
            .expect("连接已被服务端关闭")
            .expect("读取帧失败");
        if let TungsteniteMessage::Text(raw) = frame {
            return serde_json::from_str(raw.as_str()).expect("事件应为合法 JSON");
        }
    }
}

/// 跳过其他事件，直到读到指定名称的事件。
pub async fn next_event_named(ws: &mut WsClient, event: &str) -> Value {
    loop {
        let frame = next_event(ws).await;
        if frame["event"] == event {
            return frame;
        }
    }
}

/// 断言短窗口内没有任何服务端事件到达。
pub async fn assert_silent(ws: &mut WsClient) {
    match tokio::time::timeout(Duration::from_millis(300), ws.next()).await {
        Err(_) => {}
        Ok(frame) => panic!("不应收到任何帧，却读到 {frame:?}"),
    }
}
