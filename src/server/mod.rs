pub mod api;
pub mod proxy;

use crate::cli::Args;
use crate::config::prompt::PromptConfig;
use crate::history::HistoryStore;
use crate::llm::chat::ChatClient;
use crate::relay::MessageRelay;

use axum::Router;
use log::{ info, error };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn HistoryStore>,
    pub relay: Arc<MessageRelay>,
    pub chat_client: Arc<dyn ChatClient>,
    pub prompts: Arc<PromptConfig>,
}

/// The proxy routes answer their own preflights, so they stay outside the
/// CORS layer of the conversation API.
pub fn router(state: AppState) -> Router {
    Router::new().merge(proxy::routes()).merge(api::routes()).with_state(state)
}

pub struct Server {
    addr: String,
    state: AppState,
    args: Args,
}

impl Server {
    pub fn new(addr: String, state: AppState, args: Args) -> Self {
        Self { addr, state, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let app = router(self.state.clone());

        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert), Some(key)) => (cert, key),
                _ => {
                    error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                    return Err("TLS enabled without cert/key".into());
                }
            };
            info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;

            info!("HTTPS server listening on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
        } else {
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                e
            })?;
            info!("HTTP server listening on: http://{}", addr);
            axum::serve(listener, app.into_make_service()).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::prompt::APOLOGY_MESSAGE;
    use crate::history::MemoryHistoryStore;
    use crate::llm::chat::{ CompletionResponse, PromptMessage };
    use crate::relay::DirectResponder;
    use async_trait::async_trait;
    use axum::response::Response;
    use std::error::Error as StdError;
    use std::sync::Mutex;

    /// Completion backend that answers from memory and records its input.
    pub(crate) struct StubChat {
        reply: Option<String>,
        seen: Mutex<Vec<PromptMessage>>,
        calls: Mutex<usize>,
    }

    impl StubChat {
        pub(crate) fn replying(reply: &str) -> Self {
            Self { reply: Some(reply.to_string()), seen: Mutex::new(Vec::new()), calls: Mutex::new(0) }
        }

        pub(crate) fn failing() -> Self {
            Self { reply: None, seen: Mutex::new(Vec::new()), calls: Mutex::new(0) }
        }

        pub(crate) fn seen(&self) -> Vec<PromptMessage> {
            self.seen.lock().unwrap().clone()
        }

        pub(crate) fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatClient for StubChat {
        async fn complete(
            &self,
            messages: &[PromptMessage]
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            *self.calls.lock().unwrap() += 1;
            self.seen.lock().unwrap().extend_from_slice(messages);
            match &self.reply {
                Some(reply) => Ok(CompletionResponse { response: reply.clone() }),
                None => Err("upstream returned 502".into()),
            }
        }

        fn get_model(&self) -> String {
            "stub".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    pub(crate) fn test_state(chat: StubChat) -> (AppState, Arc<StubChat>) {
        let chat = Arc::new(chat);
        let prompts = Arc::new(PromptConfig::default());
        let store: Arc<dyn HistoryStore> = Arc::new(MemoryHistoryStore::new());
        let responder = Arc::new(DirectResponder::new(chat.clone(), prompts.clone()));
        let relay = Arc::new(MessageRelay::new(store.clone(), responder, APOLOGY_MESSAGE.to_string()));
        let state = AppState {
            store,
            relay,
            chat_client: chat.clone(),
            prompts,
        };
        (state, chat)
    }

    pub(crate) async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }
}
