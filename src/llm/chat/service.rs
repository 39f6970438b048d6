use super::{ ChatClient, ChatError, PromptMessage, TokenStream };
use crate::cache::CacheStore;
use crate::models::chat::{ ConversationTurn, ROLE_USER };
use log::info;
use std::collections::hash_map::DefaultHasher;
use std::hash::{ Hash, Hasher };
use std::sync::Arc;
use std::time::Duration;

/// Scope instruction prepended to every model call. It is never part of the
/// persisted conversation; the upstream model is stateless between calls.
const SYSTEM_PROMPT: &str = "You are a specialized Web3 and cryptocurrency assistant.\n\
\n\
ONLY answer questions about:\n\
- Cryptocurrency (Bitcoin, Ethereum, altcoins, trading, market analysis)\n\
- Blockchain technology and protocols\n\
- DeFi (Decentralized Finance): yield farming, liquidity pools, lending, AMMs\n\
- NFTs (Non-Fungible Tokens) and digital assets\n\
- Smart contracts and dApp development\n\
- DAOs and governance tokens\n\
- Crypto wallets and security best practices\n\
- Staking, mining, and consensus mechanisms\n\
- Layer 2 solutions and blockchain scaling\n\
- Web3 platforms, trends, and industry developments\n\
\n\
If ANY question is about a non-Web3 topic (weather, entertainment, \
traditional finance, food, health, travel, general technology, academic \
subjects, personal advice), you MUST respond with EXACTLY:\n\
\"I only provide information about Web3, cryptocurrency, and blockchain \
technology. I cannot help with this topic.\"\n\
\n\
Use the conversation history to stay consistent, reference previous \
discussion when relevant, and avoid repeating yourself.";

/// Question shapes common enough to cache: definitional asks whose answers
/// do not depend on live data.
const CACHEABLE_PATTERNS: &[&str] = &[
    "what is",
    "what are",
    "how does",
    "explain",
    "define",
    "difference between",
    "benefits of",
    "risks of",
    "how to",
];

/// Out-of-scope messages are declined locally and never reach the model.
const DECLINE_RESPONSES: &[&str] = &[
    "I only provide information about Web3, cryptocurrency, and blockchain technology. I cannot help with this topic.",
    "I'm specialized exclusively in Web3 and crypto. I can only assist with blockchain, DeFi, NFTs, and cryptocurrency questions.",
    "This is outside my scope. I focus solely on Web3, cryptocurrency, and blockchain-related topics.",
    "I cannot help with that topic. I'm designed specifically for Web3, crypto, and blockchain assistance only.",
    "That's not something I can assist with. I only handle Web3, cryptocurrency, and blockchain technology questions.",
];

/// Grounded, scope-restricted chat answers: assembles the context window,
/// streams model output, and short-circuits definitional questions through
/// the answer cache.
pub struct ChatService {
    client: Arc<dyn ChatClient>,
    cache: Arc<dyn CacheStore>,
    answer_ttl: Duration,
}

impl ChatService {
    pub fn new(client: Arc<dyn ChatClient>, cache: Arc<dyn CacheStore>, answer_ttl: Duration) -> Self {
        Self { client, cache, answer_ttl }
    }

    /// Start a model stream for `message` grounded in the supplied context
    /// window (already bounded to the configured turn limit, oldest first).
    pub async fn stream_answer(
        &self,
        context: &[ConversationTurn],
        message: &str
    ) -> Result<TokenStream, ChatError> {
        let messages = build_messages(context, message);
        self.client.stream_completion(&messages).await
    }

    pub async fn cached_answer(&self, conversation_id: &str, message: &str) -> Option<String> {
        if !is_cacheable_question(message) {
            return None;
        }
        let answer = self.cache.get(&answer_cache_key(conversation_id, message)).await;
        if answer.is_some() {
            info!("Chat answer cache hit for conversation {}", conversation_id);
        }
        answer
    }

    pub async fn store_answer(&self, conversation_id: &str, message: &str, answer: &str) {
        if !is_cacheable_question(message) || answer.is_empty() {
            return;
        }
        self.cache
            .set(&answer_cache_key(conversation_id, message), answer, self.answer_ttl).await;
    }

    /// Fixed decline for out-of-scope messages, picked deterministically from
    /// the message text.
    pub fn decline_response(message: &str) -> &'static str {
        let mut hasher = DefaultHasher::new();
        message.hash(&mut hasher);
        let index = (hasher.finish() as usize) % DECLINE_RESPONSES.len();
        DECLINE_RESPONSES[index]
    }
}

/// Scope prompt first, then the prior turns verbatim in chronological order,
/// then the new user message.
fn build_messages(context: &[ConversationTurn], message: &str) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(context.len() + 2);
    messages.push(PromptMessage::new("system", SYSTEM_PROMPT));
    for turn in context {
        messages.push(PromptMessage::new(&turn.role, &turn.content));
    }
    messages.push(PromptMessage::new(ROLE_USER, message));
    messages
}

fn is_cacheable_question(message: &str) -> bool {
    let normalized = message.to_lowercase();
    let normalized = normalized.trim();
    CACHEABLE_PATTERNS.iter().any(|pattern| normalized.contains(pattern))
}

fn answer_cache_key(conversation_id: &str, message: &str) -> String {
    let mut hasher = DefaultHasher::new();
    message.trim().to_lowercase().hash(&mut hasher);
    format!("chat:{:x}:{}", hasher.finish(), conversation_id)
}
