use super::HistoryStore;
use crate::models::chat::{ Conversation, ConversationTurn };
use async_trait::async_trait;
use chrono::Utc;
use log::error;
use redis::{ AsyncCommands, Client };
use std::collections::HashMap;
use std::error::Error;
use uuid::Uuid;

/// Redis layout: conversation metadata in a hash, turns in a list (newest
/// first), and a per-user index in a sorted set scored by last activity.
pub struct RedisHistoryStore {
    client: Client,
    key_prefix: String,
    scan_limit: usize,
}

impl RedisHistoryStore {
    pub fn new(
        url: &str,
        key_prefix: &str,
        scan_limit: usize
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            client: Client::open(url)?,
            key_prefix: key_prefix.to_string(),
            scan_limit,
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn meta_key(&self, conversation_id: &str) -> String {
        format!("{}meta:{}", self.key_prefix, conversation_id)
    }

    fn turns_key(&self, conversation_id: &str) -> String {
        format!("{}turns:{}", self.key_prefix, conversation_id)
    }

    fn user_key(&self, user_id: &str) -> String {
        format!("{}user:{}", self.key_prefix, user_id)
    }

    fn parse_meta(conversation_id: &str, fields: HashMap<String, String>) -> Conversation {
        let read_i64 = |name: &str| {
            fields
                .get(name)
                .and_then(|value| value.parse::<i64>().ok())
                .unwrap_or(0)
        };
        Conversation {
            id: conversation_id.to_string(),
            user_id: fields.get("user_id").cloned().unwrap_or_default(),
            title: fields.get("title").cloned().unwrap_or_default(),
            created_at: read_i64("created_at"),
            last_activity: read_i64("last_activity"),
            turns: Vec::new(),
        }
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn create_conversation(
        &self,
        user_id: &str,
        title: &str
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let now = Utc::now().timestamp();
        let id = Uuid::new_v4().to_string();

        let fields = [
            ("user_id", user_id.to_string()),
            ("title", title.to_string()),
            ("created_at", now.to_string()),
            ("last_activity", now.to_string()),
        ];
        conn.hset_multiple::<_, _, _, ()>(self.meta_key(&id), &fields).await?;
        conn.zadd::<_, _, _, ()>(self.user_key(user_id), &id, now as f64).await?;

        Ok(Conversation {
            id,
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            last_activity: now,
            turns: Vec::new(),
        })
    }

    async fn get_conversation(
        &self,
        conversation_id: &str
    ) -> Result<Option<Conversation>, Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(self.meta_key(conversation_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::parse_meta(conversation_id, fields)))
    }

    async fn append_turn(
        &self,
        conversation_id: &str,
        turn: &ConversationTurn
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let meta_key = self.meta_key(conversation_id);

        let user_id: Option<String> = conn.hget(&meta_key, "user_id").await?;
        let user_id = user_id.ok_or_else(|| format!("Unknown conversation: {}", conversation_id))?;

        let json_turn = serde_json::to_string(turn)?;
        let _: i64 = conn.lpush(self.turns_key(conversation_id), &json_turn).await?;
        conn.hset::<_, _, _, ()>(&meta_key, "last_activity", turn.timestamp).await?;
        conn.zadd::<_, _, _, ()>(
            self.user_key(&user_id),
            conversation_id,
            turn.timestamp as f64
        ).await?;
        Ok(())
    }

    async fn recent_turns(
        &self,
        conversation_id: &str,
        limit: usize
    ) -> Result<Vec<ConversationTurn>, Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let json_entries: Vec<String> = conn.lrange(
            self.turns_key(conversation_id),
            0,
            (limit as isize) - 1
        ).await?;

        let mut turns = Vec::new();
        for json_entry in &json_entries {
            match serde_json::from_str::<ConversationTurn>(json_entry) {
                Ok(turn) => turns.push(turn),
                Err(e) => error!("Error parsing history entry: {}", e),
            }
        }
        turns.reverse();
        Ok(turns)
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize
    ) -> Result<Vec<Conversation>, Box<dyn Error + Send + Sync>> {
        let mut conn = self.get_connection().await?;
        let ids: Vec<String> = conn.zrevrange(
            self.user_key(user_id),
            0,
            (limit as isize) - 1
        ).await?;

        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            let fields: HashMap<String, String> = conn.hgetall(self.meta_key(&id)).await?;
            if !fields.is_empty() {
                conversations.push(Self::parse_meta(&id, fields));
            }
        }
        Ok(conversations)
    }

    async fn search_conversations(
        &self,
        user_id: &str,
        query: &str
    ) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
        let needle = query.to_lowercase();
        let mut conn = self.get_connection().await?;
        let ids: Vec<String> = conn.zrevrange(
            self.user_key(user_id),
            0,
            (self.scan_limit as isize) - 1
        ).await?;

        let mut hits = Vec::new();
        for id in ids {
            let json_entries: Vec<String> = conn.lrange(
                self.turns_key(&id),
                0,
                (self.scan_limit as isize) - 1
            ).await?;
            let matched = json_entries.iter().any(|json_entry| {
                serde_json
                    ::from_str::<ConversationTurn>(json_entry)
                    .map(|turn| turn.content.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            });
            if matched {
                hits.push(id);
            }
        }
        Ok(hits)
    }
}
