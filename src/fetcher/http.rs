//! HTTP-backed fetchers for the upstream user and posts resources.
//!
//! Both fetchers share one retry loop: an attempt that fails at the
//! transport level or returns a non-200 status is retried with exponential
//! backoff; a malformed target or an undecodable 200 body fails at once.

use super::{Fetcher, RetryPolicy};
use crate::context::RequestContext;
use crate::error::{FetchError, Resource};
use crate::models::{Post, UserProfile};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Fetches one profile from `GET {base_url}/{id}`.
#[derive(Debug, Clone)]
pub struct HttpUserFetcher {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpUserFetcher {
    pub fn new(client: Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            retry,
        }
    }

    fn url_for(&self, user_id: i64) -> Result<Url, FetchError> {
        let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), user_id);
        Url::parse(&raw).map_err(|e| FetchError::RequestBuild {
            resource: Resource::User,
            reason: format!("{}: {}", raw, e),
        })
    }
}

#[async_trait]
impl Fetcher for HttpUserFetcher {
    type Output = UserProfile;

    async fn fetch(&self, user_id: i64, ctx: &RequestContext) -> Result<UserProfile, FetchError> {
        let url = self.url_for(user_id)?;
        get_json(&self.client, &url, Resource::User, self.retry, ctx).await
    }
}

/// Fetches a user's posts from `GET {base_url}?userId={id}`.
#[derive(Debug, Clone)]
pub struct HttpPostsFetcher {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpPostsFetcher {
    pub fn new(client: Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            retry,
        }
    }

    /// Any `userId` already present on the base URL is replaced.
    fn url_for(&self, user_id: i64) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| FetchError::RequestBuild {
            resource: Resource::Posts,
            reason: format!("invalid posts base url {}: {}", self.base_url, e),
        })?;

        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| *key != "userId")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(retained)
            .append_pair("userId", &user_id.to_string());

        Ok(url)
    }
}

#[async_trait]
impl Fetcher for HttpPostsFetcher {
    type Output = Vec<Post>;

    async fn fetch(&self, user_id: i64, ctx: &RequestContext) -> Result<Vec<Post>, FetchError> {
        let url = self.url_for(user_id)?;
        get_json(&self.client, &url, Resource::Posts, self.retry, ctx).await
    }
}

/// GET `url` and decode the 200 body, retrying transient failures.
///
/// Returns the last observed error once attempts are exhausted, or the
/// context's interruption if it fires during a request or a backoff wait.
async fn get_json<T>(
    client: &Client,
    url: &Url,
    resource: Resource,
    retry: RetryPolicy,
    ctx: &RequestContext,
) -> Result<T, FetchError>
where
    T: DeserializeOwned,
{
    let mut attempt: u32 = 0;

    loop {
        let error = match attempt_once(client, url, resource, attempt, ctx).await {
            Ok(entity) => return Ok(entity),
            Err(error) => error,
        };

        if !error.is_retriable() {
            return Err(error);
        }

        attempt += 1;
        if attempt >= retry.attempts() {
            warn!(%resource, attempts = attempt, error = %error, "Upstream retries exhausted");
            return Err(error);
        }

        let delay = retry.backoff(attempt - 1);
        debug!(
            %resource,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying upstream request"
        );
        ctx.sleep(delay).await?;
    }
}

async fn attempt_once<T>(
    client: &Client,
    url: &Url,
    resource: Resource,
    attempt: u32,
    ctx: &RequestContext,
) -> Result<T, FetchError>
where
    T: DeserializeOwned,
{
    ctx.check()?;
    debug!(%resource, attempt = attempt + 1, url = %url, "Sending upstream request");

    let response = ctx
        .run(client.get(url.clone()).send())
        .await?
        .map_err(|source| transport_error(resource, source))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(FetchError::UpstreamStatus {
            resource,
            status: status.as_u16(),
        });
    }

    let body = ctx
        .run(response.bytes())
        .await?
        .map_err(|source| FetchError::Transport { resource, source })?;

    serde_json::from_slice(&body).map_err(|source| FetchError::Decode { resource, source })
}

fn transport_error(resource: Resource, source: reqwest::Error) -> FetchError {
    if source.is_builder() {
        FetchError::RequestBuild {
            resource,
            reason: source.to_string(),
        }
    } else {
        FetchError::Transport { resource, source }
    }
}
