pub mod api;

use crate::orchestrator::Orchestrator;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    orchestrator: Arc<Orchestrator>,
}

impl Server {
    pub fn new(addr: String, orchestrator: Arc<Orchestrator>) -> Self {
        Self { addr, orchestrator }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(&self.addr, Arc::clone(&self.orchestrator)).await
    }
}
