//! Firebase Realtime Database backend over its REST API.
//!
//! `GET {url}/{path}.json` returns the subtree (or `null`), `POST` to the same
//! endpoint appends a child under a server-generated push key.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::Value;

use super::{ChildRecord, KeyPath, RemoteStore};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

pub struct FirebaseStore {
    client: Client,
    database_url: Url,
    auth_token: Option<String>,
}

impl FirebaseStore {
    pub fn new(database_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Self::with_client(database_url, client)
    }

    pub fn with_client(database_url: &str, client: Client) -> Result<Self> {
        let parsed = Url::parse(database_url)
            .with_context(|| format!("invalid database url '{database_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
            bail!("database url must start with http:// or https://, got '{database_url}'");
        }

        Ok(Self {
            client,
            database_url: parsed,
            auth_token: None,
        })
    }

    /// Token passed as the `auth` query parameter on every request.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn database_url(&self) -> &str {
        self.database_url.as_str().trim_end_matches('/')
    }

    /// `{url}/{path}.json`, each segment percent-encoded on its own.
    pub fn endpoint(&self, path: &KeyPath) -> Result<Url> {
        let (last, parents) = path
            .segments()
            .split_last()
            .ok_or_else(|| anyhow!("key path has no segments"))?;

        let mut url = self.database_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} cannot take a path", self.database_url))?
            .pop_if_empty()
            .extend(parents)
            .push(&format!("{last}.json"));
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }
}

/// Flatten a subtree snapshot into its direct children.
///
/// Objects come back ordered by key, which for push keys is creation order.
/// Arrays appear when every key is a small integer; `null` slots are absent children.
pub fn children_from_snapshot(snapshot: Value) -> Vec<ChildRecord> {
    match snapshot {
        Value::Object(map) => {
            let mut children: Vec<_> = map
                .into_iter()
                .map(|(key, value)| ChildRecord::new(key, value))
                .collect();
            children.sort_by(|a, b| a.key.cmp(&b.key));
            children
        }
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, value)| !value.is_null())
            .map(|(index, value)| ChildRecord::new(index.to_string(), value))
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    async fn read_children(&self, path: &KeyPath) -> Result<Vec<ChildRecord>> {
        let url = self.endpoint(path)?;
        debug!("GET {url}");

        let snapshot: Value = self
            .authorized(self.client.get(url.clone()))
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} rejected the read"))?
            .json()
            .await
            .with_context(|| format!("{url} returned invalid JSON"))?;

        Ok(children_from_snapshot(snapshot))
    }

    async fn push_child(&self, path: &KeyPath, value: Value) -> Result<String> {
        let url = self.endpoint(path)?;
        debug!("POST {url}");

        let response: PushResponse = self
            .authorized(self.client.post(url.clone()))
            .json(&value)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} rejected the write"))?
            .json()
            .await
            .with_context(|| format!("{url} returned an unexpected push response"))?;

        Ok(response.name)
    }
}
