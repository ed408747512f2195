pub mod client;
pub mod models;
pub mod server;
pub mod config;
pub mod llm;
pub mod cli;
pub mod history;
pub mod relay;

use client::ProxyClient;
use cli::Args;
use log::info;
use relay::{ DirectResponder, MessageRelay, Responder };
use server::{ AppState, Server };
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("provider default"));
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("provider default"));
    info!("History Store Type: {}", args.history_type);
    if args.history_type.eq_ignore_ascii_case("redis") {
        info!("History Store Host: {}", args.history_host);
    }
    info!("Relay Mode: {}", args.relay_mode);
    if args.relay_mode.eq_ignore_ascii_case("proxy") {
        info!("Proxy URL: {}", args.proxy_url);
    }
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let prompts = config::prompt::load_or_default(args.prompts_path.as_deref())?;
    let chat_config = args.chat_llm_config()?;
    let chat_client = llm::chat::new_client(&chat_config)?;
    info!(
        "Completion client ready: model {} at {}",
        chat_client.get_model(),
        chat_client.get_base_url().unwrap_or_else(|| "provider default".to_string())
    );
    let store = history::initialize_history_store(&args)?;
    if let Some(owner) = args.sample_owner.as_deref() {
        history::sample::seed_if_empty(store.as_ref(), owner).await?;
    }

    let responder: Arc<dyn Responder> = match args.relay_mode.to_lowercase().as_str() {
        "direct" => Arc::new(DirectResponder::new(Arc::clone(&chat_client), Arc::clone(&prompts))),
        "proxy" => Arc::new(ProxyClient::new(&args.proxy_url)?),
        other => {
            return Err(format!("Unsupported relay mode: {}", other).into());
        }
    };
    let relay = Arc::new(
        MessageRelay::new(Arc::clone(&store), responder, prompts.apology_message.clone())
    );

    let state = AppState {
        store,
        relay,
        chat_client,
        prompts,
    };
    let server = Server::new(args.server_addr.clone(), state, args.clone());
    server.run().await?;

    Ok(())
}
