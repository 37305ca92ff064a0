#![doc = "Consul HTTP client: implements the core `KvStore` trait against the consul agent API."]
//
//! # Consul client
//!
//! Bridges [`update_kv_core::contract::KvStore`] to a consul agent over HTTP:
//!
//! - leader probe: `GET /v1/status/leader`, an empty string means no leader
//! - read: `GET /v1/kv/<key>?raw`, 404 means the key does not exist
//! - write: `PUT /v1/kv/<key>` with the value as body, consul answers `true`/`false`
//!
//! Construct a [`ConsulClient`] from [`ConsulSettings`]; the address accepts
//! the `CONSUL_HTTP_ADDR` convention of an optional scheme.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use std::time::Duration;

use update_kv_core::contract::{KvStore, StoreError};

pub const DEFAULT_CONSUL_ADDR: &str = "http://127.0.0.1:8500";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Where and how to reach consul.
#[derive(Clone, PartialEq, Eq)]
pub struct ConsulSettings {
    pub addr: String,
    pub token: Option<String>,
}

impl Default for ConsulSettings {
    fn default() -> Self {
        Self {
            addr: DEFAULT_CONSUL_ADDR.to_owned(),
            token: None,
        }
    }
}

impl std::fmt::Debug for ConsulSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsulSettings")
            .field("addr", &self.addr)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `host:port` gets an `http://` scheme; anything with a scheme is kept.
pub fn normalize_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.contains("://") {
        addr.to_owned()
    } else {
        format!("http://{addr}")
    }
}

pub struct ConsulClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl ConsulClient {
    pub fn new(settings: &ConsulSettings) -> Result<Self, StoreError> {
        let base = Url::parse(&normalize_addr(&settings.addr)).map_err(|e| {
            tracing::error!(error = ?e, addr = %settings.addr, "Invalid consul address");
            format!("invalid consul address '{}': {e}", settings.addr)
        })?;
        if base.cannot_be_a_base() {
            return Err(format!("invalid consul address '{}'", settings.addr).into());
        }
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        tracing::info!(
            addr = %base,
            token_set = settings.token.is_some(),
            "Initialized ConsulClient"
        );
        Ok(Self {
            http,
            base,
            token: settings.token.clone(),
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| format!("invalid consul address '{}'", self.base))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `/v1/kv/<key>`, each `/`-separated part of the key percent-encoded.
    fn kv_url(&self, key: &str) -> Result<Url, StoreError> {
        self.endpoint(["v1", "kv"].into_iter().chain(key.split('/')))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token),
            None => builder,
        }
    }
}

#[async_trait]
impl KvStore for ConsulClient {
    async fn leader_status(&self) -> Result<bool, StoreError> {
        let url = self.endpoint(["v1", "status", "leader"])?;
        let leader: String = self
            .request(Method::GET, url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::debug!(leader = %leader, "Fetched consul leader");
        Ok(!leader.is_empty())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut url = self.kv_url(key)?;
        url.set_query(Some("raw"));
        let resp = self.request(Method::GET, url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            tracing::debug!(key = %key, "Key not present in consul");
            return Ok(None);
        }
        let body = resp.error_for_status()?.bytes().await?;
        tracing::debug!(key = %key, bytes = body.len(), "Fetched key from consul");
        Ok(Some(body.to_vec()))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let url = self.kv_url(key)?;
        let accepted: bool = self
            .request(Method::PUT, url)
            .body(value.to_owned())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !accepted {
            tracing::error!(key = %key, "Consul refused the write");
            return Err(format!("consul refused to write key '{key}'").into());
        }
        tracing::debug!(key = %key, "Wrote key to consul");
        Ok(())
    }
}
