use async_trait::async_trait;
use futures::StreamExt;
use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::time::Duration;

use web3_chatbot::cache::CacheStore;
use web3_chatbot::cache::memory::MemoryCache;
use web3_chatbot::history::{ ConversationManager, MemoryHistoryStore };
use web3_chatbot::llm::chat::{
    ChatClient,
    ChatError,
    ChatService,
    CompletionResponse,
    PromptMessage,
    TokenStream,
};
use web3_chatbot::models::chat::ConversationTurn;
use web3_chatbot::models::stream::{ ChatRequest, StreamEvent };
use web3_chatbot::orchestrator::Orchestrator;
use web3_chatbot::price::{ PriceError, PriceProvider, PriceService, ProviderQuote };

struct FakeChatClient {
    fragments: Vec<Result<String, String>>,
    fail_at_start: bool,
    seen_prompts: Mutex<Vec<Vec<PromptMessage>>>,
}

impl FakeChatClient {
    fn streaming(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments
                .iter()
                .map(|fragment| Ok(fragment.to_string()))
                .collect(),
            fail_at_start: false,
            seen_prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing_mid_stream(fragments: &[&str]) -> Self {
        let mut items: Vec<Result<String, String>> = fragments
            .iter()
            .map(|fragment| Ok(fragment.to_string()))
            .collect();
        items.push(Err("connection reset".to_string()));
        Self { fragments: items, fail_at_start: false, seen_prompts: Mutex::new(Vec::new()) }
    }

    fn failing_at_start() -> Self {
        Self { fragments: Vec::new(), fail_at_start: true, seen_prompts: Mutex::new(Vec::new()) }
    }

    fn stream_calls(&self) -> usize {
        self.seen_prompts.lock().unwrap().len()
    }

    fn prompt(&self, call: usize) -> Vec<PromptMessage> {
        self.seen_prompts.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    async fn complete(
        &self,
        _messages: &[PromptMessage]
    ) -> Result<CompletionResponse, ChatError> {
        Ok(CompletionResponse { response: "unused".to_string() })
    }

    async fn stream_completion(
        &self,
        messages: &[PromptMessage]
    ) -> Result<TokenStream, ChatError> {
        self.seen_prompts.lock().unwrap().push(messages.to_vec());
        if self.fail_at_start {
            return Err(ChatError::ModelUnavailable("scripted outage".to_string()));
        }
        let items = self.fragments.clone();
        let stream = futures::stream::iter(
            items.into_iter().map(|item| {
                item.map_err(|e| {
                    Box::new(std::io::Error::new(std::io::ErrorKind::Other, e)) as Box<
                        dyn StdError + Send + Sync
                    >
                })
            })
        );
        Ok(Box::pin(stream))
    }
}

struct FakePriceProvider {
    calls: AtomicUsize,
    fail: bool,
}

impl FakePriceProvider {
    fn ok() -> Self {
        Self { calls: AtomicUsize::new(0), fail: false }
    }

    fn failing() -> Self {
        Self { calls: AtomicUsize::new(0), fail: true }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceProvider for FakePriceProvider {
    async fn fetch_price(&self, coin_id: &str) -> Result<ProviderQuote, PriceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PriceError::UpstreamUnavailable("scripted outage".to_string()));
        }
        let _ = coin_id;
        Ok(ProviderQuote {
            usd: 2345.67,
            usd_market_cap: Some(280_000_000_000.0),
            usd_24h_vol: Some(12_000_000_000.0),
            usd_24h_change: Some(2.5),
        })
    }
}

fn orchestrator_with(
    chat_client: Arc<FakeChatClient>,
    provider: Arc<FakePriceProvider>
) -> Orchestrator {
    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    let chat = Arc::new(
        ChatService::new(chat_client, Arc::clone(&cache), Duration::from_secs(3600))
    );
    let price = Arc::new(PriceService::new(provider, cache, Duration::from_secs(30)));
    let conversations = ConversationManager::new(
        Arc::new(MemoryHistoryStore::new()),
        Duration::from_secs(3600)
    );
    Orchestrator::new(chat, price, conversations, 10)
}

fn request(message: &str) -> ChatRequest {
    ChatRequest {
        message: message.to_string(),
        user_id: "u1".to_string(),
        conversation_id: None,
    }
}

async fn collect(orchestrator: &Orchestrator, req: ChatRequest) -> Vec<StreamEvent> {
    orchestrator.handle(req).collect().await
}

fn event_kinds(events: &[StreamEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| {
            match event {
                StreamEvent::Start { .. } => "start",
                StreamEvent::ConversationId { .. } => "conversation_id",
                StreamEvent::Intent { .. } => "intent",
                StreamEvent::Content { .. } => "content",
                StreamEvent::Complete { .. } => "complete",
                StreamEvent::Error { .. } => "error",
            }
        })
        .collect()
}

fn conversation_id(events: &[StreamEvent]) -> String {
    events
        .iter()
        .find_map(|event| {
            match event {
                StreamEvent::ConversationId { conversation_id } => Some(conversation_id.clone()),
                _ => None,
            }
        })
        .expect("stream carried no conversation_id event")
}

fn content_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|event| {
            match event {
                StreamEvent::Content { content } => Some(content.as_str()),
                _ => None,
            }
        })
        .collect()
}

#[tokio::test]
async fn price_query_streams_a_formatted_quote() {
    let chat_client = Arc::new(FakeChatClient::streaming(&[]));
    let provider = Arc::new(FakePriceProvider::ok());
    let orchestrator = orchestrator_with(Arc::clone(&chat_client), Arc::clone(&provider));

    let events = collect(&orchestrator, request("What's the price of ETH?")).await;

    assert_eq!(
        event_kinds(&events),
        vec!["start", "conversation_id", "intent", "content", "complete"]
    );
    assert!(events.contains(&StreamEvent::Intent { intent: "price_query".to_string() }));
    let quote_text = content_text(&events);
    assert!(quote_text.contains("💰 ETH Price Update"));
    assert_eq!(provider.call_count(), 1);
    // The model is never consulted for a price query.
    assert_eq!(chat_client.stream_calls(), 0);

    let turns = orchestrator
        .conversations()
        .recent_turns(&conversation_id(&events), 10).await
        .unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, "user");
    assert_eq!(turns[0].intent.as_deref(), Some("price_query"));
    assert_eq!(turns[1].role, "assistant");
    assert_eq!(turns[1].content, quote_text);
}

#[tokio::test]
async fn web3_chat_streams_model_fragments_in_order() {
    let chat_client = Arc::new(FakeChatClient::streaming(&["DeFi ", "means ", "open finance."]));
    let provider = Arc::new(FakePriceProvider::ok());
    let orchestrator = orchestrator_with(Arc::clone(&chat_client), provider);

    let events = collect(&orchestrator, request("Tell me about DeFi protocols")).await;

    assert_eq!(
        event_kinds(&events),
        vec!["start", "conversation_id", "intent", "content", "content", "content", "complete"]
    );
    assert!(events.contains(&StreamEvent::Intent { intent: "web3_chat".to_string() }));
    assert_eq!(content_text(&events), "DeFi means open finance.");

    let turns = orchestrator
        .conversations()
        .recent_turns(&conversation_id(&events), 10).await
        .unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].content, "DeFi means open finance.");
    assert!(!turns[1].error);
}

#[tokio::test]
async fn wallet_query_gets_a_fixed_answer_without_model_calls() {
    let chat_client = Arc::new(FakeChatClient::streaming(&["should not appear"]));
    let provider = Arc::new(FakePriceProvider::ok());
    let orchestrator = orchestrator_with(Arc::clone(&chat_client), Arc::clone(&provider));

    let events = collect(&orchestrator, request("show me my wallet balance")).await;

    assert_eq!(
        event_kinds(&events),
        vec!["start", "conversation_id", "intent", "content", "complete"]
    );
    assert!(events.contains(&StreamEvent::Intent { intent: "wallet_query".to_string() }));
    assert!(content_text(&events).contains("coming soon"));
    assert_eq!(chat_client.stream_calls(), 0);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn non_web3_message_is_declined_locally() {
    let chat_client = Arc::new(FakeChatClient::streaming(&["should not appear"]));
    let provider = Arc::new(FakePriceProvider::ok());
    let orchestrator = orchestrator_with(Arc::clone(&chat_client), provider);

    let events = collect(&orchestrator, request("recommend a pasta recipe")).await;

    assert_eq!(
        event_kinds(&events),
        vec!["start", "conversation_id", "intent", "content", "complete"]
    );
    assert!(events.contains(&StreamEvent::Intent { intent: "non_web3".to_string() }));
    assert!(!content_text(&events).is_empty());
    assert_eq!(chat_client.stream_calls(), 0);

    // The decline is still a real exchange: both turns are persisted.
    let turns = orchestrator
        .conversations()
        .recent_turns(&conversation_id(&events), 10).await
        .unwrap();
    assert_eq!(turns.len(), 2);
}

#[tokio::test]
async fn provider_outage_ends_the_stream_with_an_error_event() {
    let chat_client = Arc::new(FakeChatClient::streaming(&[]));
    let provider = Arc::new(FakePriceProvider::failing());
    let orchestrator = orchestrator_with(chat_client, Arc::clone(&provider));

    let events = collect(&orchestrator, request("price of DOGE?")).await;

    assert_eq!(event_kinds(&events), vec!["start", "conversation_id", "intent", "error"]);
    // Nothing was cached: a retry reaches the provider again.
    let retry = collect(&orchestrator, request("price of DOGE?")).await;
    assert_eq!(event_kinds(&retry), vec!["start", "conversation_id", "intent", "error"]);
    assert_eq!(provider.call_count(), 2);

    // No partial exchange was committed for the failed request.
    let turns = orchestrator
        .conversations()
        .recent_turns(&conversation_id(&events), 10).await
        .unwrap();
    assert!(turns.is_empty());
}

#[tokio::test]
async fn mid_stream_failure_keeps_the_partial_turn_flagged_as_error() {
    let chat_client = Arc::new(FakeChatClient::failing_mid_stream(&["Staking is "]));
    let provider = Arc::new(FakePriceProvider::ok());
    let orchestrator = orchestrator_with(chat_client, provider);

    let events = collect(&orchestrator, request("Tell me about staking rewards please")).await;

    assert_eq!(
        event_kinds(&events),
        vec!["start", "conversation_id", "intent", "content", "error"]
    );

    let turns = orchestrator
        .conversations()
        .recent_turns(&conversation_id(&events), 10).await
        .unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].content, "Staking is ");
    assert!(turns[1].error);
}

#[tokio::test]
async fn model_outage_before_first_fragment_commits_nothing() {
    let chat_client = Arc::new(FakeChatClient::failing_at_start());
    let provider = Arc::new(FakePriceProvider::ok());
    let orchestrator = orchestrator_with(chat_client, provider);

    let events = collect(&orchestrator, request("Tell me about yield farming today")).await;

    assert_eq!(event_kinds(&events), vec!["start", "conversation_id", "intent", "error"]);

    let turns = orchestrator
        .conversations()
        .recent_turns(&conversation_id(&events), 10).await
        .unwrap();
    assert!(turns.is_empty());
}

#[tokio::test]
async fn context_window_holds_exactly_the_most_recent_turns() {
    let chat_client = Arc::new(FakeChatClient::streaming(&["ok"]));
    let provider = Arc::new(FakePriceProvider::ok());
    let orchestrator = orchestrator_with(Arc::clone(&chat_client), provider);

    let conversation = orchestrator
        .conversations()
        .get_or_create("u1", None, "seed").await
        .unwrap();
    for i in 0..14 {
        let turn = if i % 2 == 0 {
            ConversationTurn::user(&format!("q{}", i), None)
        } else {
            ConversationTurn::assistant(&format!("a{}", i))
        };
        orchestrator.conversations().append_turn(&conversation.id, &turn).await.unwrap();
    }

    let mut req = request("Tell me about gas fees please");
    req.conversation_id = Some(conversation.id.clone());
    let events = collect(&orchestrator, req).await;
    assert_eq!(conversation_id(&events), conversation.id);

    // system prompt + 10 context turns + the new user message.
    let prompt = chat_client.prompt(0);
    assert_eq!(prompt.len(), 12);
    assert_eq!(prompt[0].role, "system");
    assert_eq!(prompt[1].content, "q4");
    assert_eq!(prompt[10].content, "a13");
    assert_eq!(prompt[11].content, "Tell me about gas fees please");
}

#[tokio::test]
async fn idle_conversation_keeps_its_id_but_resets_context() {
    let chat_client = Arc::new(FakeChatClient::streaming(&["fresh answer"]));
    let provider = Arc::new(FakePriceProvider::ok());
    let orchestrator = orchestrator_with(Arc::clone(&chat_client), provider);

    let conversation = orchestrator
        .conversations()
        .get_or_create("u1", None, "old topic").await
        .unwrap();
    let stale_turn = ConversationTurn {
        role: "user".to_string(),
        content: "something from two hours ago".to_string(),
        timestamp: chrono::Utc::now().timestamp() - 7200,
        intent: None,
        error: false,
    };
    orchestrator.conversations().append_turn(&conversation.id, &stale_turn).await.unwrap();

    let mut req = request("Tell me about rollups on layer 2");
    req.conversation_id = Some(conversation.id.clone());
    let events = collect(&orchestrator, req).await;

    // Same id on the wire, but the model saw no prior context.
    assert_eq!(conversation_id(&events), conversation.id);
    let prompt = chat_client.prompt(0);
    assert_eq!(prompt.len(), 2);
    assert_eq!(prompt[0].role, "system");

    // History stays readable for display: old turn plus the new exchange.
    let turns = orchestrator.conversations().recent_turns(&conversation.id, 10).await.unwrap();
    assert_eq!(turns.len(), 3);
}

#[tokio::test]
async fn definitional_answers_are_cached_per_conversation() {
    let chat_client = Arc::new(FakeChatClient::streaming(&["DeFi ", "explained."]));
    let provider = Arc::new(FakePriceProvider::ok());
    let orchestrator = orchestrator_with(Arc::clone(&chat_client), provider);

    let first = collect(&orchestrator, request("What is DeFi?")).await;
    let conversation = conversation_id(&first);

    let mut repeat = request("What is DeFi?");
    repeat.conversation_id = Some(conversation.clone());
    let second = collect(&orchestrator, repeat).await;

    assert_eq!(chat_client.stream_calls(), 1);
    assert_eq!(
        event_kinds(&second),
        vec!["start", "conversation_id", "intent", "content", "complete"]
    );
    assert_eq!(content_text(&second), "DeFi explained.");

    // Cached answers are committed like any other assistant turn.
    let turns = orchestrator.conversations().recent_turns(&conversation, 10).await.unwrap();
    assert_eq!(turns.len(), 4);
}
