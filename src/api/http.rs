use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::types::{
    EntryQuery, Envelope, MarkAllReadRequest, MarkReadRequest, MarkUnreadRequest, ReadabilityPayload,
    SubscriptionPayload, UnsubscribeRequest,
};
use super::RemoteApi;
use crate::app::Result;
use crate::domain::{Entry, FeedViewType, UnreadCount};

const USER_AGENT: &str = concat!("folo-sync/", env!("CARGO_PKG_VERSION"));

pub struct HttpApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base(base_url)?,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url).header(ACCEPT, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<Option<T>> {
        let response = builder.send().await?;
        debug!(url = %response.url(), status = %response.status(), "API response");
        response.error_for_status_ref()?;

        let body = response.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        envelope.into_data()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<T>> {
        let url = self.endpoint(path, query)?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn with_body<B, T>(&self, method: Method, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path, &[])?;
        let builder = self
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?);
        self.send(builder).await
    }
}

/// `Url::join` drops the last path segment unless it ends with a slash.
fn normalize_base(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn fetch_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>> {
        let entries: Option<Vec<Entry>> = self.with_body(Method::POST, "entries", query).await?;
        Ok(entries.unwrap_or_default())
    }

    async fn fetch_entry(&self, id: &str) -> Result<Option<Entry>> {
        self.get("entries", &[("id", id)]).await
    }

    async fn fetch_readability(&self, id: &str) -> Result<Option<String>> {
        let payload: Option<ReadabilityPayload> = self.get("entries/readability", &[("id", id)]).await?;
        Ok(payload.and_then(|p| p.content))
    }

    async fn mark_as_read(&self, entry_ids: &[String], is_inbox: bool) -> Result<()> {
        let body = MarkReadRequest {
            entry_ids: entry_ids.to_vec(),
            is_inbox,
        };
        let _: Option<IgnoredAny> = self.with_body(Method::POST, "reads", &body).await?;
        Ok(())
    }

    async fn mark_as_unread(&self, entry_id: &str) -> Result<()> {
        let body = MarkUnreadRequest {
            entry_id: entry_id.to_string(),
        };
        let _: Option<IgnoredAny> = self.with_body(Method::DELETE, "reads", &body).await?;
        Ok(())
    }

    async fn mark_all_as_read(&self, request: &MarkAllReadRequest) -> Result<()> {
        let _: Option<IgnoredAny> = self.with_body(Method::POST, "reads/all", request).await?;
        Ok(())
    }

    async fn fetch_unread(&self) -> Result<Vec<UnreadCount>> {
        let counts: Option<HashMap<String, u64>> = self.get("reads", &[]).await?;
        let mut counts: Vec<UnreadCount> = counts
            .unwrap_or_default()
            .into_iter()
            .map(|(id, count)| UnreadCount::new(id, count))
            .collect();
        counts.sort_by(|a, b| a.subscription_id.cmp(&b.subscription_id));
        Ok(counts)
    }

    async fn fetch_subscriptions(&self, view: Option<FeedViewType>) -> Result<Vec<SubscriptionPayload>> {
        let view = view.map(|v| u8::from(v).to_string());
        let query: Vec<(&str, &str)> = view.iter().map(|v| ("view", v.as_str())).collect();
        let subs: Option<Vec<SubscriptionPayload>> = self.get("subscriptions", &query).await?;
        Ok(subs.unwrap_or_default())
    }

    async fn unsubscribe(&self, request: &UnsubscribeRequest) -> Result<()> {
        let _: Option<IgnoredAny> = self.with_body(Method::DELETE, "subscriptions", request).await?;
        Ok(())
    }
}
