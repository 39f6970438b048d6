use super::HistoryStore;
use crate::models::chat::{ Conversation, ConversationTurn };
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::error::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

struct StoredConversation {
    meta: Conversation,
    turns: Vec<ConversationTurn>,
}

/// Process-local history backend for tests and dependency-free runs.
pub struct MemoryHistoryStore {
    conversations: RwLock<HashMap<String, StoredConversation>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self { conversations: RwLock::new(HashMap::new()) }
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn create_conversation(
        &self,
        user_id: &str,
        title: &str
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        let now = Utc::now().timestamp();
        let meta = Conversation {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            last_activity: now,
            turns: Vec::new(),
        };
        self.conversations
            .write().await
            .insert(meta.id.clone(), StoredConversation { meta: meta.clone(), turns: Vec::new() });
        Ok(meta)
    }

    async fn get_conversation(
        &self,
        conversation_id: &str
    ) -> Result<Option<Conversation>, Box<dyn Error + Send + Sync>> {
        Ok(self.conversations.read().await.get(conversation_id).map(|stored| stored.meta.clone()))
    }

    async fn append_turn(
        &self,
        conversation_id: &str,
        turn: &ConversationTurn
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conversations = self.conversations.write().await;
        let stored = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| format!("Unknown conversation: {}", conversation_id))?;
        stored.turns.push(turn.clone());
        stored.meta.last_activity = turn.timestamp;
        Ok(())
    }

    async fn recent_turns(
        &self,
        conversation_id: &str,
        limit: usize
    ) -> Result<Vec<ConversationTurn>, Box<dyn Error + Send + Sync>> {
        let conversations = self.conversations.read().await;
        let turns = match conversations.get(conversation_id) {
            Some(stored) => &stored.turns,
            None => {
                return Ok(Vec::new());
            }
        };
        let start = turns.len().saturating_sub(limit);
        Ok(turns[start..].to_vec())
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize
    ) -> Result<Vec<Conversation>, Box<dyn Error + Send + Sync>> {
        let conversations = self.conversations.read().await;
        let mut matching: Vec<Conversation> = conversations
            .values()
            .filter(|stored| stored.meta.user_id == user_id)
            .map(|stored| stored.meta.clone())
            .collect();
        matching.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn search_conversations(
        &self,
        user_id: &str,
        query: &str
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        let needle = query.to_lowercase();
        let conversations = self.conversations.read().await;
        let mut hits: Vec<&StoredConversation> = conversations
            .values()
            .filter(|stored| stored.meta.user_id == user_id)
            .filter(|stored|
                stored.turns.iter().any(|turn| turn.content.to_lowercase().contains(&needle))
            )
            .collect();
        hits.sort_by(|a, b| b.meta.last_activity.cmp(&a.meta.last_activity));
        Ok(
            hits
                .into_iter()
                .map(|stored| stored.meta.id.clone())
                .collect()
        )
    }
}
