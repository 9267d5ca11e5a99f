use chrono::{DateTime, Utc};
use domain::{
    Attachment, Conversation, ConversationId, ConversationRepository, LatestMessage, Message,
    MessageId, MessageKind, MessageOrder, MessageRepository, RepositoryError, RepositoryFuture,
    Timestamp, UserId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::conflict(db_err.to_string());
        }
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct ConversationRecord {
    id: Uuid,
    participant_low: Uuid,
    participant_high: Uuid,
    latest_message_text: Option<String>,
    latest_message_sender: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConversationRecord> for Conversation {
    type Error = RepositoryError;

    fn try_from(value: ConversationRecord) -> Result<Self, Self::Error> {
        let latest_message = match (value.latest_message_text, value.latest_message_sender) {
            (Some(text), Some(sender)) => Some(LatestMessage {
                text,
                sender_id: UserId::from(sender),
            }),
            (None, None) => None,
            _ => return Err(invalid_data("latest message columns must be set together")),
        };

        Conversation::with_id(
            ConversationId::from(value.id),
            UserId::from(value.participant_low),
            UserId::from(value.participant_high),
            latest_message,
            value.created_at,
            value.updated_at,
        )
        .map_err(|err| invalid_data(err.to_string()))
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    body_text: Option<String>,
    attachment_url: Option<String>,
    attachment_ref: Option<String>,
    kind: String,
    seen: bool,
    seen_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let attachment = match (value.attachment_url, value.attachment_ref) {
            (Some(url), Some(storage_ref)) => Some(Attachment { url, storage_ref }),
            (None, None) => None,
            _ => return Err(invalid_data("attachment columns must be set together")),
        };
        let kind =
            MessageKind::parse(&value.kind).map_err(|err| invalid_data(err.to_string()))?;

        Message::with_id(
            MessageId::from(value.id),
            ConversationId::from(value.conversation_id),
            UserId::from(value.sender_id),
            value.body_text,
            attachment,
            kind,
            value.seen,
            value.seen_at,
            value.created_at,
        )
        .map_err(|err| invalid_data(err.to_string()))
    }
}

#[derive(Clone)]
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ConversationRepository for PgConversationRepository {
    fn create(&self, conversation: Conversation) -> RepositoryFuture<Conversation> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let [low, high] = conversation.participants;
            let record = sqlx::query_as::<_, ConversationRecord>(
                r#"
                INSERT INTO conversations (id, participant_low, participant_high, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, participant_low, participant_high, latest_message_text, latest_message_sender, created_at, updated_at
                "#,
            )
            .bind(Uuid::from(conversation.id))
            .bind(Uuid::from(low))
            .bind(Uuid::from(high))
            .bind(conversation.created_at)
            .bind(conversation.updated_at)
            .fetch_one(&pool)
            .await
            .map_err(map_sqlx_err)?;

            Conversation::try_from(record)
        })
    }

    fn find_by_id(&self, id: ConversationId) -> RepositoryFuture<Option<Conversation>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, ConversationRecord>(
                r#"
                SELECT id, participant_low, participant_high, latest_message_text, latest_message_sender, created_at, updated_at
                FROM conversations
                WHERE id = $1
                "#,
            )
            .bind(Uuid::from(id))
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?;

            record.map(Conversation::try_from).transpose()
        })
    }

    fn find_by_participants(
        &self,
        a: UserId,
        b: UserId,
    ) -> RepositoryFuture<Option<Conversation>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let (low, high) = if Uuid::from(a) <= Uuid::from(b) {
                (a, b)
            } else {
                (b, a)
            };

            let record = sqlx::query_as::<_, ConversationRecord>(
                r#"
                SELECT id, participant_low, participant_high, latest_message_text, latest_message_sender, created_at, updated_at
                FROM conversations
                WHERE participant_low = $1 AND participant_high = $2
                "#,
            )
            .bind(Uuid::from(low))
            .bind(Uuid::from(high))
            .fetch_optional(&pool)
            .await
            .map_err(map_sqlx_err)?;

            record.map(Conversation::try_from).transpose()
        })
    }

    fn list_for_user(&self, user: UserId) -> RepositoryFuture<Vec<Conversation>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let records = sqlx::query_as::<_, ConversationRecord>(
                r#"
                SELECT id, participant_low, participant_high, latest_message_text, latest_message_sender, created_at, updated_at
                FROM conversations
                WHERE participant_low = $1 OR participant_high = $1
                ORDER BY updated_at DESC
                "#,
            )
            .bind(Uuid::from(user))
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx_err)?;

            records
                .into_iter()
                .map(Conversation::try_from)
                .collect::<Result<Vec<_>, _>>()
        })
    }

    fn update_latest_message(
        &self,
        id: ConversationId,
        latest: LatestMessage,
        updated_at: Timestamp,
    ) -> RepositoryFuture<()> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let result = sqlx::query(
                r#"
                UPDATE conversations
                SET latest_message_text = $2, latest_message_sender = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(Uuid::from(id))
            .bind(&latest.text)
            .bind(Uuid::from(latest.sender_id))
            .bind(updated_at)
            .execute(&pool)
            .await
            .map_err(map_sqlx_err)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::storage("conversation missing"));
            }
            Ok(())
        })
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl MessageRepository for PgMessageRepository {
    fn create(&self, message: Message) -> RepositoryFuture<Message> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let record = sqlx::query_as::<_, MessageRecord>(
                r#"
                INSERT INTO messages (id, conversation_id, sender_id, body_text, attachment_url, attachment_ref, kind, seen, seen_at, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING id, conversation_id, sender_id, body_text, attachment_url, attachment_ref, kind, seen, seen_at, created_at
                "#,
            )
            .bind(Uuid::from(message.id))
            .bind(Uuid::from(message.conversation_id))
            .bind(Uuid::from(message.sender_id))
            .bind(&message.text)
            .bind(message.attachment.as_ref().map(|a| a.url.clone()))
            .bind(message.attachment.as_ref().map(|a| a.storage_ref.clone()))
            .bind(message.kind.as_str())
            .bind(message.seen)
            .bind(message.seen_at)
            .bind(message.created_at)
            .fetch_one(&pool)
            .await
            .map_err(map_sqlx_err)?;

            Message::try_from(record)
        })
    }

    fn list_by_conversation(
        &self,
        conversation_id: ConversationId,
        order: MessageOrder,
    ) -> RepositoryFuture<Vec<Message>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let sql = match order {
                MessageOrder::OldestFirst => {
                    r#"
                    SELECT id, conversation_id, sender_id, body_text, attachment_url, attachment_ref, kind, seen, seen_at, created_at
                    FROM messages
                    WHERE conversation_id = $1
                    ORDER BY created_at ASC, id ASC
                    "#
                }
                MessageOrder::NewestFirst => {
                    r#"
                    SELECT id, conversation_id, sender_id, body_text, attachment_url, attachment_ref, kind, seen, seen_at, created_at
                    FROM messages
                    WHERE conversation_id = $1
                    ORDER BY created_at DESC, id DESC
                    "#
                }
            };

            let records = sqlx::query_as::<_, MessageRecord>(sql)
                .bind(Uuid::from(conversation_id))
                .fetch_all(&pool)
                .await
                .map_err(map_sqlx_err)?;

            records
                .into_iter()
                .map(Message::try_from)
                .collect::<Result<Vec<_>, _>>()
        })
    }

    fn count_unseen(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> RepositoryFuture<u64> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let count = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*)
                FROM messages
                WHERE conversation_id = $1 AND sender_id <> $2 AND NOT seen
                "#,
            )
            .bind(Uuid::from(conversation_id))
            .bind(Uuid::from(reader))
            .fetch_one(&pool)
            .await
            .map_err(map_sqlx_err)?;

            Ok(count as u64)
        })
    }

    fn mark_conversation_seen(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        at: Timestamp,
    ) -> RepositoryFuture<Vec<MessageId>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let ids = sqlx::query_scalar::<_, Uuid>(
                r#"
                UPDATE messages
                SET seen = TRUE, seen_at = $3
                WHERE conversation_id = $1 AND sender_id <> $2 AND NOT seen
                RETURNING id
                "#,
            )
            .bind(Uuid::from(conversation_id))
            .bind(Uuid::from(reader))
            .bind(at)
            .fetch_all(&pool)
            .await
            .map_err(map_sqlx_err)?;

            Ok(ids.into_iter().map(MessageId::from).collect())
        })
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
