//! 主应用程序入口
//!
//! 装配仓储、实时路由与 Web API，启动 Axum 服务。

use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, Clock, PresencePublisher, RoomRouter, SessionRegistry,
    SystemClock, TypingRelay,
};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, ChannelRoomRouter, DiskUploadStorage, HttpUserDirectory,
    PgConversationRepository, PgMessageRepository,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env_with_defaults();

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').next_back().unwrap_or("unknown")
    );

    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;

    // 运行迁移
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    let conversation_repository = Arc::new(PgConversationRepository::new(pg_pool.clone()));
    let message_repository = Arc::new(PgMessageRepository::new(pg_pool));

    let session_registry = Arc::new(SessionRegistry::new());
    let room_router = Arc::new(ChannelRoomRouter::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());
    let user_directory = Arc::new(HttpUserDirectory::new(
        reqwest::Client::new(),
        config.directory.base_url.clone(),
    ));

    let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
        conversation_repository,
        message_repository,
        session_registry: Arc::clone(&session_registry),
        room_router: Arc::clone(&room_router) as Arc<dyn RoomRouter>,
        user_directory,
        clock,
    }));

    let presence = Arc::new(PresencePublisher::new(
        Arc::clone(&session_registry),
        Arc::clone(&room_router) as Arc<dyn RoomRouter>,
    ));
    let typing_relay = Arc::new(TypingRelay::new(
        Arc::clone(&room_router) as Arc<dyn RoomRouter>,
    ));

    let upload_storage = Arc::new(DiskUploadStorage::new(
        config.uploads.root.clone(),
        config.uploads.public_base_url.clone(),
    ));
    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    let state = AppState::new(
        chat_service,
        session_registry,
        room_router,
        presence,
        typing_relay,
        upload_storage,
        jwt_service,
    );

    let app = router(state);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("聊天服务器启动在 http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
