use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Url;

use crate::config::NetworkConfig;
use crate::error::NetworkError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Network transport the backend-facing activities share.
#[async_trait]
pub trait Network: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse, NetworkError>;
    async fn post(&self, url: &Url, body: String, content_type: &str) -> Result<u16, NetworkError>;
    fn is_associated(&self) -> bool;
    fn request_association(&self);
}

/// reqwest-backed transport. Every request carries the client timeout so
/// no call can hang an activity indefinitely.
pub struct HttpNetwork {
    client: reqwest::Client,
    credentials: Option<NetworkConfig>,
}

impl HttpNetwork {
    pub fn new(
        timeout: Duration,
        credentials: Option<NetworkConfig>,
    ) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("beacon-rs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpNetwork {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn get(&self, url: &Url) -> Result<HttpResponse, NetworkError> {
        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }

    async fn post(&self, url: &Url, body: String, content_type: &str) -> Result<u16, NetworkError> {
        debug!("POST {} ({} bytes)", url, body.len());
        let response = self
            .client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    /// The host OS owns association; a non-loopback hardware address is
    /// taken as evidence of an up interface.
    fn is_associated(&self) -> bool {
        matches!(mac_address::get_mac_address(), Ok(Some(_)))
    }

    fn request_association(&self) {
        match self.credentials.as_ref() {
            Some(credentials) => info!(
                "Requesting association with {:?} (password {})",
                credentials.ssid,
                if credentials.password.is_some() { "set" } else { "unset" }
            ),
            None => warn!("Network lost and no credentials configured to rejoin"),
        }
    }
}
