//! MCP Chat Server
//!
//! Entry point serving the chat widget page and the relay it posts to.

use std::sync::Arc;

use dotenvy::dotenv;
use mimalloc::MiMalloc;

use mcp_chat::config::AppConfig;
use mcp_chat::{server, telemetry};

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    telemetry::init(&config.logging)?;

    server::start_server(Arc::new(config)).await
}
