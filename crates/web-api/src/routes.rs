use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::{
    ApplicationError, CreateConversationRequest, OpenConversationRequest, SendMessageRequest,
    UserProfile,
};
use domain::{Conversation, ConversationId, Message, UserId};

use crate::{error::ApiError, socket::websocket_upgrade, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewChatPayload {
    receiver_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewChatResponse {
    message: &'static str,
    chat_id: ConversationId,
}

#[derive(Debug, Serialize)]
struct ChatListResponse {
    chats: Vec<ChatListEntry>,
}

#[derive(Debug, Serialize)]
struct ChatListEntry {
    user: UserProfile,
    chat: ChatSnapshot,
}

/// 会话记录加上未读数，对应列表页的一行。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatSnapshot {
    #[serde(flatten)]
    conversation: Conversation,
    unseen_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    message: &'static str,
    message_data: Message,
    sender: UserId,
}

#[derive(Debug, Serialize)]
struct ConversationMessagesResponse {
    messages: Vec<Message>,
    user: UserProfile,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chat/new", post(create_chat))
        .route("/chats/all", get(list_chats))
        .route("/message", post(send_message))
        .route("/message/{chat_id}", get(get_conversation_messages))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn create_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewChatPayload>,
) -> Result<(StatusCode, Json<NewChatResponse>), ApiError> {
    let caller = state.jwt_service.extract_user_from_headers(&headers)?;

    let outcome = state
        .chat_service
        .create_conversation(CreateConversationRequest {
            initiator_id: caller,
            peer_id: payload.receiver_id,
        })
        .await?;

    let (status, message) = if outcome.created {
        (StatusCode::CREATED, "New chat created successfully")
    } else {
        (StatusCode::OK, "Chat already exists")
    };

    Ok((
        status,
        Json(NewChatResponse {
            message,
            chat_id: outcome.conversation.id,
        }),
    ))
}

async fn list_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ChatListResponse>, ApiError> {
    let caller = state.jwt_service.extract_user_from_headers(&headers)?;

    let summaries = state.chat_service.list_conversations(caller).await?;
    let chats = summaries
        .into_iter()
        .map(|summary| ChatListEntry {
            user: summary.counterpart,
            chat: ChatSnapshot {
                conversation: summary.conversation,
                unseen_count: summary.unseen_count,
            },
        })
        .collect();

    Ok(Json(ChatListResponse { chats }))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    let sender = state.jwt_service.extract_user_from_headers(&headers)?;

    let mut chat_id: Option<Uuid> = None;
    let mut text: Option<String> = None;
    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart payload: {}", err)))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("chatId") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|err| ApiError::bad_request(format!("invalid chatId field: {}", err)))?;
                chat_id = Some(
                    raw.parse()
                        .map_err(|_| ApiError::bad_request("chatId must be a UUID"))?,
                );
            }
            Some("text") => {
                text = Some(field.text().await.map_err(|err| {
                    ApiError::bad_request(format!("invalid text field: {}", err))
                })?);
            }
            Some("image") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|err| {
                    ApiError::bad_request(format!("invalid image field: {}", err))
                })?;
                image = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let chat_id = chat_id.ok_or_else(|| ApiError::bad_request("Chat ID is required"))?;

    let attachment = match image {
        Some((filename, bytes)) => Some(
            state
                .upload_storage
                .store(&filename, bytes)
                .await
                .map_err(ApplicationError::from)?,
        ),
        None => None,
    };

    let message = state
        .chat_service
        .send_message(SendMessageRequest {
            conversation_id: chat_id,
            sender_id: sender,
            text,
            attachment,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            message: "Message sent successfully",
            message_data: message,
            sender: UserId::from(sender),
        }),
    ))
}

async fn get_conversation_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<ConversationMessagesResponse>, ApiError> {
    let caller = state.jwt_service.extract_user_from_headers(&headers)?;

    let view = state
        .chat_service
        .open_conversation(OpenConversationRequest {
            conversation_id: chat_id,
            user_id: caller,
        })
        .await?;

    Ok(Json(ConversationMessagesResponse {
        messages: view.messages,
        user: view.counterpart,
    }))
}
