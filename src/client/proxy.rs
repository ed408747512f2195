use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use std::error::Error;
use url::Url;

use crate::models::proxy::{ ErrorBody, GenerateRequest, GenerateResponse };
use crate::relay::Responder;

/// Obtains replies from a deployed proxy endpoint.
pub struct ProxyClient {
    http: HttpClient,
    url: Url,
}

impl ProxyClient {
    pub fn new(url: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let url = Url::parse(url).map_err(|e| format!("Invalid proxy URL '{}': {}", url, e))?;
        Ok(Self { http: HttpClient::new(), url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Responder for ProxyClient {
    async fn respond(
        &self,
        message: &str,
        chat_id: &str
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        debug!("Requesting reply for {} from {}", chat_id, self.url);
        let resp = self.http
            .post(self.url.clone())
            .json(&GenerateRequest::new(message, chat_id))
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<ErrorBody>().await
                .map(|body| body.error)
                .unwrap_or_else(|_| "no error body".to_string());
            return Err(format!("Proxy returned {}: {}", status, detail).into());
        }

        let body: GenerateResponse = resp.json().await?;
        Ok(body.response)
    }
}
