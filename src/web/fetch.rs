use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{PrepError, PrepResult};

/// Source of proposal pages
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> PrepResult<String>;
}

/// Fetches pages over HTTP(S)
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> PrepResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("catalyst-prep/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> PrepResult<String> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PrepError::Server {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(response.text().await?)
    }
}
