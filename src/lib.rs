pub mod cache;
pub mod cli;
pub mod coins;
pub mod history;
pub mod intent;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod price;
pub mod server;

use cli::Args;
use log::info;
use orchestrator::Orchestrator;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Cache Type: {}", args.cache_type);
    info!("History Store Type: {}", args.history_type);
    info!("Price Cache TTL: {}s", args.price_cache_ttl);
    info!("Chat Answer Cache TTL: {}s", args.chat_cache_ttl);
    info!("Context Turn Limit: {}", args.max_context_turns);
    info!("Conversation Idle Timeout: {}s", args.conversation_idle_timeout);
    info!("-------------------------");

    let orchestrator = Arc::new(Orchestrator::from_args(&args).await?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, orchestrator);
    server.run().await?;

    Ok(())
}
