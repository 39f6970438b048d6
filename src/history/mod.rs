mod memory;
mod redis;

pub use memory::MemoryHistoryStore;
pub use redis::RedisHistoryStore;

use crate::cli::Args;
use crate::models::chat::{ derive_title, Conversation, ConversationTurn };
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Persistence boundary for conversations. Also answers the external search
/// collaborator's contract: a containment scan returning matching
/// conversation ids, with ranking left to the collaborator.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn create_conversation(
        &self,
        user_id: &str,
        title: &str
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>>;

    /// Metadata only; `turns` is left empty.
    async fn get_conversation(
        &self,
        conversation_id: &str
    ) -> Result<Option<Conversation>, Box<dyn Error + Send + Sync>>;

    async fn append_turn(
        &self,
        conversation_id: &str,
        turn: &ConversationTurn
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// The `limit` most recent turns in chronological order.
    async fn recent_turns(
        &self,
        conversation_id: &str,
        limit: usize
    ) -> Result<Vec<ConversationTurn>, Box<dyn Error + Send + Sync>>;

    /// Most recently active first, `turns` left empty.
    async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize
    ) -> Result<Vec<Conversation>, Box<dyn Error + Send + Sync>>;

    async fn search_conversations(
        &self,
        user_id: &str,
        query: &str
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>>;
}

pub fn create_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    info!("Conversation history will be stored in: {}", args.history_type);
    match args.history_type.to_lowercase().as_str() {
        "redis" => {
            let store = RedisHistoryStore::new(
                &args.history_redis_url,
                &args.history_redis_prefix,
                args.history_scan_limit
            )?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryHistoryStore::new())),
        other =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", other)
                    )
                )
            ),
    }
}

/// Owns conversation identity and the context-window lifecycle. Appends go
/// through here, making it the single writer per conversation.
#[derive(Clone)]
pub struct ConversationManager {
    store: Arc<dyn HistoryStore>,
    idle_timeout: Duration,
}

impl ConversationManager {
    pub fn new(store: Arc<dyn HistoryStore>, idle_timeout: Duration) -> Self {
        Self { store, idle_timeout }
    }

    /// Returns the existing conversation when the supplied id is known —
    /// even when idle-expired, so the id stays stable for display — and
    /// otherwise creates a fresh one titled from the first user message.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        conversation_id: Option<&str>,
        first_message: &str
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        if let Some(id) = conversation_id {
            if let Some(conversation) = self.store.get_conversation(id).await? {
                return Ok(conversation);
            }
            info!("Conversation '{}' not found; starting a new one", id);
        }
        self.store.create_conversation(user_id, &derive_title(first_message)).await
    }

    /// A conversation whose last activity predates the idle window keeps its
    /// history but contributes nothing to new context windows.
    pub fn is_context_expired(&self, conversation: &Conversation) -> bool {
        let idle_for = Utc::now().timestamp() - conversation.last_activity;
        idle_for > (self.idle_timeout.as_secs() as i64)
    }

    /// Context window for the model: the most recent `limit` turns, oldest
    /// first, or an empty prefix when the conversation is idle-expired.
    pub async fn context_turns(
        &self,
        conversation: &Conversation,
        limit: usize
    ) -> Result<Vec<ConversationTurn>, Box<dyn Error + Send + Sync>> {
        if self.is_context_expired(conversation) {
            info!("Conversation {} is past the idle window; starting fresh context", conversation.id);
            return Ok(Vec::new());
        }
        self.store.recent_turns(&conversation.id, limit).await
    }

    pub async fn append_turn(
        &self,
        conversation_id: &str,
        turn: &ConversationTurn
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.store.append_turn(conversation_id, turn).await
    }

    /// Historical turns for display and search; idle expiry does not apply.
    pub async fn recent_turns(
        &self,
        conversation_id: &str,
        limit: usize
    ) -> Result<Vec<ConversationTurn>, Box<dyn Error + Send + Sync>> {
        self.store.recent_turns(conversation_id, limit).await
    }

    pub async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize
    ) -> Result<Vec<Conversation>, Box<dyn Error + Send + Sync>> {
        self.store.list_conversations(user_id, limit).await
    }

    pub async fn search_conversations(
        &self,
        user_id: &str,
        query: &str
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        self.store.search_conversations(user_id, query).await
    }
}
