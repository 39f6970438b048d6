use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:8000")]
    pub server_addr: String,

    // --- Chat LLM Provider Args ---
    /// API key for the Groq chat completion API.
    #[arg(long, env = "GROQ_API_KEY", default_value = "")]
    pub groq_api_key: String,

    /// Model name for chat completion.
    #[arg(long, env = "GROQ_MODEL")] // No default, rely on adapter default if None
    pub groq_model: Option<String>,

    /// Base URL for the Groq OpenAI-compatible API.
    #[arg(long, env = "GROQ_BASE_URL")]
    pub groq_base_url: Option<String>,

    /// Maximum completion tokens per model call.
    #[arg(long, env = "GROQ_MAX_TOKENS", default_value = "1000")]
    pub groq_max_tokens: u32,

    /// Sampling temperature for model calls.
    #[arg(long, env = "GROQ_TEMPERATURE", default_value = "0.7")]
    pub groq_temperature: f32,

    // --- Price Provider Args ---
    /// Base URL for the CoinGecko API.
    #[arg(long, env = "COINGECKO_BASE_URL")]
    pub coingecko_base_url: Option<String>,

    /// Optional CoinGecko Pro API key.
    #[arg(long, env = "COINGECKO_API_KEY")]
    pub coingecko_api_key: Option<String>,

    // --- Caching Args ---
    /// Cache backend (redis, memory).
    #[arg(long, env = "CACHE_TYPE", default_value = "redis")]
    pub cache_type: String,

    /// Redis URL for the caching layer.
    #[arg(long, env = "CACHE_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub cache_redis_url: String,

    /// Time-to-live in seconds for cached price quotes. Short by design:
    /// bounds staleness on a fast-moving value while limiting upstream calls.
    #[arg(long, env = "CACHE_PRICE_TTL", default_value = "30")]
    pub price_cache_ttl: u64,

    /// Time-to-live in seconds for cached chat answers.
    #[arg(long, env = "CACHE_CHAT_TTL", default_value = "3600")]
    pub chat_cache_ttl: u64,

    // --- Conversation History Args ---
    /// History store type (redis, memory).
    #[arg(long, env = "HISTORY_TYPE", default_value = "redis")]
    pub history_type: String,

    /// Redis URL for the history store.
    #[arg(long, env = "HISTORY_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub history_redis_url: String,

    /// Prefix for Redis history keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "history:")]
    pub history_redis_prefix: String,

    /// Upper bound on entries examined per conversation when searching.
    #[arg(long, env = "HISTORY_SCAN_LIMIT", default_value = "100")]
    pub history_scan_limit: usize,

    /// Number of recent turns included in the model context window.
    #[arg(long, env = "MAX_CONTEXT_TURNS", default_value = "10")]
    pub max_context_turns: usize,

    /// Seconds of inactivity after which a conversation's context window
    /// resets. Historical turns stay readable for display and search.
    #[arg(long, env = "CONVERSATION_IDLE_TIMEOUT", default_value = "3600")]
    pub conversation_idle_timeout: u64,
}
