use crate::cache;
use crate::cli::Args;
use crate::history::{ create_history_store, ConversationManager };
use crate::intent::{ self, Intent, IntentKind };
use crate::llm::LlmConfig;
use crate::llm::chat::{ self, ChatService };
use crate::models::chat::{ Conversation, ConversationTurn };
use crate::models::stream::{ ChatRequest, StreamEvent };
use crate::price::{ self, coingecko::CoinGeckoClient, PriceError, PriceService };

use futures::{ Stream, StreamExt };
use log::{ error, info, warn };
use std::error::Error;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{ Duration, Instant };
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const WALLET_MESSAGE: &str =
    "🔒 Wallet features are coming soon! For now, I can help with cryptocurrency prices and Web3 concepts.";

const EVENT_CHANNEL_CAPACITY: usize = 32;

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Top-level router. Each request runs as its own task feeding a bounded
/// channel, so one slow consumer never stalls another request; a dropped
/// receiver aborts the pipeline and with it any in-flight upstream call.
#[derive(Clone)]
pub struct Orchestrator {
    chat: Arc<ChatService>,
    price: Arc<PriceService>,
    conversations: ConversationManager,
    max_context_turns: usize,
}

impl Orchestrator {
    pub fn new(
        chat: Arc<ChatService>,
        price: Arc<PriceService>,
        conversations: ConversationManager,
        max_context_turns: usize
    ) -> Self {
        Self { chat, price, conversations, max_context_turns }
    }

    pub async fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let cache = cache::init(args).await;

        let history_store = create_history_store(args)?;
        let conversations = ConversationManager::new(
            history_store,
            Duration::from_secs(args.conversation_idle_timeout)
        );

        let llm_config = LlmConfig {
            api_key: Some(args.groq_api_key.clone()).filter(|key| !key.is_empty()),
            model: args.groq_model.clone(),
            base_url: args.groq_base_url.clone(),
            max_tokens: args.groq_max_tokens,
            temperature: args.groq_temperature,
        };
        let chat_client = chat::new_client(&llm_config)?;
        let chat = Arc::new(
            ChatService::new(
                chat_client,
                Arc::clone(&cache),
                Duration::from_secs(args.chat_cache_ttl)
            )
        );

        let provider = CoinGeckoClient::new(
            args.coingecko_base_url.clone(),
            args.coingecko_api_key.clone()
        )?;
        let price = Arc::new(
            PriceService::new(Arc::new(provider), cache, Duration::from_secs(args.price_cache_ttl))
        );

        Ok(Self::new(chat, price, conversations, args.max_context_turns))
    }

    /// Single-pass event sequence for one message: `start`,
    /// `conversation_id`, `intent`, zero or more `content`, then exactly one
    /// of `complete` | `error`.
    pub fn handle(&self, request: ChatRequest) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_pipeline(request, tx).await;
        });
        Box::pin(ReceiverStream::new(rx))
    }

    async fn run_pipeline(self, request: ChatRequest, tx: mpsc::Sender<StreamEvent>) {
        let started = Instant::now();

        let start = StreamEvent::Start { message: "Processing your request...".to_string() };
        if tx.send(start).await.is_err() {
            return;
        }

        let conversation = match
            self.conversations.get_or_create(
                &request.user_id,
                request.conversation_id.as_deref(),
                &request.message
            ).await
        {
            Ok(conversation) => conversation,
            Err(e) => {
                error!("Failed to resolve conversation: {}", e);
                let _ = tx.send(StreamEvent::Error {
                    message: "Unable to resolve the conversation. Please try again.".to_string(),
                }).await;
                return;
            }
        };
        let id_event = StreamEvent::ConversationId { conversation_id: conversation.id.clone() };
        if tx.send(id_event).await.is_err() {
            return;
        }

        let intent = intent::classify(&request.message);
        info!(
            "Classified message in conversation {} as {} (confidence {:.2})",
            conversation.id,
            intent.kind,
            intent.confidence
        );
        let intent_event = StreamEvent::Intent { intent: intent.kind.to_string() };
        if tx.send(intent_event).await.is_err() {
            return;
        }

        match intent.kind {
            IntentKind::PriceQuery => {
                self.run_price(&request, &conversation, &intent, &tx, started).await;
            }
            IntentKind::Web3Chat => {
                self.run_chat(&request, &conversation, &intent, &tx, started).await;
            }
            IntentKind::WalletQuery => {
                // No backing implementation yet; never routed to the model.
                self.finish_fixed(&request, &conversation, &intent, WALLET_MESSAGE, &tx, started).await;
            }
            IntentKind::NonWeb3 => {
                let decline = ChatService::decline_response(&request.message);
                self.finish_fixed(&request, &conversation, &intent, decline, &tx, started).await;
            }
        }
    }

    async fn run_price(
        &self,
        request: &ChatRequest,
        conversation: &Conversation,
        intent: &Intent,
        tx: &mpsc::Sender<StreamEvent>,
        started: Instant
    ) {
        let coin = intent.coin.as_deref().unwrap_or("bitcoin");
        match self.price.get_price(coin).await {
            Ok(quote) => {
                let text = price::format_quote(&quote);
                if tx.send(StreamEvent::Content { content: text.clone() }).await.is_err() {
                    return;
                }
                self.commit_exchange(conversation, &request.message, intent, &text, false).await;
                let _ = tx.send(StreamEvent::Complete { response_time: elapsed_secs(started) }).await;
            }
            Err(e) => {
                warn!("Price lookup for '{}' failed: {}", coin, e);
                let _ = tx.send(StreamEvent::Error { message: price_error_message(&e) }).await;
            }
        }
    }

    async fn run_chat(
        &self,
        request: &ChatRequest,
        conversation: &Conversation,
        intent: &Intent,
        tx: &mpsc::Sender<StreamEvent>,
        started: Instant
    ) {
        if let Some(answer) = self.chat.cached_answer(&conversation.id, &request.message).await {
            self.finish_fixed(request, conversation, intent, &answer, tx, started).await;
            return;
        }

        let context = match
            self.conversations.context_turns(conversation, self.max_context_turns).await
        {
            Ok(context) => context,
            Err(e) => {
                warn!("Context assembly failed for {}: {}. Continuing without context.", conversation.id, e);
                Vec::new()
            }
        };

        let mut stream = match self.chat.stream_answer(&context, &request.message).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Model stream could not start: {}", e);
                let _ = tx.send(StreamEvent::Error {
                    message: "I'm sorry, I'm having trouble processing your request right now. Please try again.".to_string(),
                }).await;
                return;
            }
        };

        let mut full_response = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => {
                    full_response.push_str(&fragment);
                    if tx.send(StreamEvent::Content { content: fragment }).await.is_err() {
                        info!("Client disconnected mid-stream for conversation {}", conversation.id);
                        return;
                    }
                }
                Err(e) => {
                    error!("Model stream failed mid-response: {}", e);
                    // Fragments already shown to the user are kept, flagged
                    // as an error turn; an empty stream commits nothing.
                    if !full_response.is_empty() {
                        self.commit_exchange(conversation, &request.message, intent, &full_response, true).await;
                    }
                    let _ = tx.send(StreamEvent::Error {
                        message: "The response was interrupted. Please try again.".to_string(),
                    }).await;
                    return;
                }
            }
        }

        self.chat.store_answer(&conversation.id, &request.message, &full_response).await;
        self.commit_exchange(conversation, &request.message, intent, &full_response, false).await;
        let _ = tx.send(StreamEvent::Complete { response_time: elapsed_secs(started) }).await;
    }

    async fn finish_fixed(
        &self,
        request: &ChatRequest,
        conversation: &Conversation,
        intent: &Intent,
        text: &str,
        tx: &mpsc::Sender<StreamEvent>,
        started: Instant
    ) {
        if tx.send(StreamEvent::Content { content: text.to_string() }).await.is_err() {
            return;
        }
        self.commit_exchange(conversation, &request.message, intent, text, false).await;
        let _ = tx.send(StreamEvent::Complete { response_time: elapsed_secs(started) }).await;
    }

    /// Terminal-commit of one exchange: the user turn (with its intent
    /// label) and the assistant turn. History failures are logged, not
    /// surfaced: the answer already reached the caller.
    async fn commit_exchange(
        &self,
        conversation: &Conversation,
        message: &str,
        intent: &Intent,
        assistant_text: &str,
        assistant_errored: bool
    ) {
        let user_turn = ConversationTurn::user(message, Some(intent.kind.as_str()));
        if let Err(e) = self.conversations.append_turn(&conversation.id, &user_turn).await {
            warn!("History write (user) failed: {}", e);
        }

        let mut assistant_turn = ConversationTurn::assistant(assistant_text);
        if assistant_errored {
            assistant_turn = assistant_turn.with_error();
        }
        if let Err(e) = self.conversations.append_turn(&conversation.id, &assistant_turn).await {
            warn!("History write (assistant) failed: {}", e);
        }
    }

    pub fn conversations(&self) -> &ConversationManager {
        &self.conversations
    }
}

fn elapsed_secs(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 1000.0).round() / 1000.0
}

fn price_error_message(error: &PriceError) -> String {
    match error {
        PriceError::UnknownCoin(coin) =>
            format!(
                "Sorry, I couldn't find price information for \"{}\". Try asking about Bitcoin, Ethereum, Cardano, Solana, or Dogecoin.",
                coin
            ),
        PriceError::UpstreamUnavailable(_) =>
            "I'm having trouble fetching price information right now. Please try again in a moment.".to_string(),
    }
}
