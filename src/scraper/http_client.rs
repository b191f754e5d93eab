use crate::config::ScraperConfig;
use crate::error::{FetchError, Result};
use anyhow::Context;
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// The network seam the fetchers talk through.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET an HTML page, decoding with `charset` unless the response declares one.
    async fn get_text(&self, url: &Url, charset: &str) -> Result<String>;

    /// GET a JSON document. No request timeout.
    async fn get_json(&self, url: &Url) -> Result<serde_json::Value>;

    /// GET and discard, keeping whatever cookies the response sets.
    async fn visit(&self, url: &Url) -> Result<()>;
}

/// One shared `reqwest::Client`: cookie store, gzip, fixed headers.
pub struct HttpClient {
    inner: reqwest::Client,
    html_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name {:?}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .gzip(true)
            // The listing endpoint refuses requests without the home-page cookie
            .cookie_store(true);

        if let Some(ua) = config.user_agents.choose(&mut rand::rng()) {
            debug!("Using user agent: {}", ua);
            builder = builder.user_agent(ua.as_str());
        }

        let inner = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            html_timeout: config.html_timeout(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        let resp = request.send().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get_text(&self, url: &Url, charset: &str) -> Result<String> {
        let request = self.inner.get(url.as_str()).timeout(self.html_timeout);
        let resp = self.send(request, url).await?;
        resp.text_with_charset(charset)
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })
    }

    async fn get_json(&self, url: &Url) -> Result<serde_json::Value> {
        let resp = self.send(self.inner.get(url.as_str()), url).await?;
        let body = resp.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn visit(&self, url: &Url) -> Result<()> {
        self.send(self.inner.get(url.as_str()), url).await?;
        Ok(())
    }
}
