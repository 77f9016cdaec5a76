//! HTTP client talking to a live API server

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Client, ClientError, ListOptions, Reader};
use crate::rest::{RestConfig, RestMapper, RestMapping};
use crate::scheme::{GroupVersionKind, Object, ObjectKey};

/// Sliding one-second window of request timestamps
struct RequestLimiter {
    sent: VecDeque<Instant>,
    limit: usize,
    window: Duration,
}

impl RequestLimiter {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            sent: VecDeque::new(),
            limit,
            window,
        }
    }

    /// Record a request at `now`, or return how long to wait before retrying
    fn check_and_record(&mut self, now: Instant) -> Option<Duration> {
        if self.limit == 0 {
            return None;
        }

        // Remove timestamps outside window
        while let Some(&timestamp) = self.sent.front() {
            if now.duration_since(timestamp) >= self.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }

        if self.sent.len() >= self.limit
            && let Some(&oldest) = self.sent.front()
        {
            return Some(self.window - now.duration_since(oldest));
        }
        self.sent.push_back(now);
        None
    }
}

/// [`Client`] implementation over the API server's REST interface
pub struct HttpClient {
    base_url: String,
    bearer_token: Option<String>,
    http: reqwest::Client,
    mapper: Arc<dyn RestMapper>,
    limiter: Mutex<RequestLimiter>,
}

impl HttpClient {
    /// Create a new client from connection configuration
    ///
    /// No request is made here; the server is first contacted on use.
    pub fn from_config(config: &RestConfig, mapper: Arc<dyn RestMapper>) -> Result<Self, ClientError> {
        debug!(host = %config.host, timeout_ms = config.timeout_ms, "HttpClient::from_config: called");
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            base_url: config.host.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
            http,
            mapper,
            limiter: Mutex::new(RequestLimiter::new(config.qps as usize, Duration::from_secs(1))),
        })
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url, ClientError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse_with_params(&raw, params).map_err(|e| ClientError::Api {
            status: 0,
            message: format!("invalid URL {}: {}", raw, e),
        })
    }

    async fn throttle(&self) {
        loop {
            let wait = self.limiter.lock().await.check_and_record(Instant::now());
            match wait {
                Some(delay) => {
                    debug!(?delay, "HttpClient::throttle: rate limited");
                    tokio::time::sleep(delay).await;
                }
                None => return,
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
        kind: &str,
        key: &str,
    ) -> Result<Option<Value>, ClientError> {
        debug!(%method, %url, "HttpClient::send: called");
        self.throttle().await;

        let mut request = self.http.request(method, url).header("accept", "application/json");
        if let Some(token) = &self.bearer_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        if !(200..300).contains(&status) {
            debug!(status, "HttpClient::send: API error");
            return Err(ClientError::from_status(status, kind, key, status_message(&text)));
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn mapping(&self, gvk: &GroupVersionKind) -> Result<RestMapping, ClientError> {
        Ok(self.mapper.rest_mapping(gvk)?)
    }

    async fn write(&self, method: Method, obj: &Object) -> Result<Object, ClientError> {
        let mapping = self.mapping(&obj.gvk)?;
        let ns = obj.metadata.namespace.as_deref();
        let path = if method == Method::POST {
            mapping.collection_path(ns)
        } else {
            mapping.object_path(ns, &obj.metadata.name)
        };
        let url = self.url(&path, &[])?;
        let key = obj.key().to_string();
        match self.send(method, url, Some(obj.to_json()), &obj.gvk.kind, &key).await? {
            Some(body) => Ok(Object::from_json(&obj.gvk, body)?),
            None => Ok(obj.clone()),
        }
    }
}

/// Pull `message` out of a Status body, falling back to the raw text
fn status_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| text.to_string())
}

#[async_trait]
impl Reader for HttpClient {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<Object, ClientError> {
        let mapping = self.mapping(gvk)?;
        let url = self.url(&mapping.object_path(key.namespace.as_deref(), &key.name), &[])?;
        match self.send(Method::GET, url, None, &gvk.kind, &key.to_string()).await? {
            Some(body) => Ok(Object::from_json(gvk, body)?),
            None => Err(ClientError::NotFound {
                kind: gvk.kind.clone(),
                key: key.to_string(),
            }),
        }
    }

    async fn list(&self, gvk: &GroupVersionKind, opts: &ListOptions) -> Result<Vec<Object>, ClientError> {
        let mapping = self.mapping(gvk)?;
        let mut params = Vec::new();
        if let Some(selector) = opts.label_selector() {
            params.push(("labelSelector", selector));
        }
        if let Some((field, value)) = &opts.field {
            params.push(("fieldSelector", format!("{}={}", field, value)));
        }
        let url = self.url(&mapping.collection_path(opts.namespace.as_deref()), &params)?;

        let body = self
            .send(Method::GET, url, None, &gvk.kind, &mapping.resource)
            .await?
            .unwrap_or(Value::Null);
        let items = match body.get("items") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        debug!(kind = %gvk.kind, count = items.len(), "HttpClient::list: received items");
        items
            .into_iter()
            .map(|item| Object::from_json(gvk, item).map_err(ClientError::from))
            .collect()
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn create(&self, obj: &Object) -> Result<Object, ClientError> {
        self.write(Method::POST, obj).await
    }

    async fn update(&self, obj: &Object) -> Result<Object, ClientError> {
        self.write(Method::PUT, obj).await
    }

    async fn delete(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<(), ClientError> {
        let mapping = self.mapping(gvk)?;
        let url = self.url(&mapping.object_path(key.namespace.as_deref(), &key.name), &[])?;
        self.send(Method::DELETE, url, None, &gvk.kind, &key.to_string()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::StaticRestMapper;
    use crate::scheme::Scheme;

    fn client(host: &str) -> HttpClient {
        let mapper = Arc::new(StaticRestMapper::from_scheme(&Scheme::with_core_kinds()));
        HttpClient::from_config(&RestConfig::new(host), mapper).unwrap()
    }

    #[test]
    fn test_url_building() {
        let client = client("http://127.0.0.1:8080/");
        let url = client
            .url("/api/v1/pods", &[("labelSelector", "app=web,tier=front".to_string())])
            .unwrap();
        assert_eq!(url.path(), "/api/v1/pods");
        assert_eq!(
            url.query_pairs().next().map(|(k, v)| (k.to_string(), v.to_string())),
            Some(("labelSelector".to_string(), "app=web,tier=front".to_string()))
        );
    }

    #[test]
    fn test_invalid_host() {
        let client = client("not a url");
        assert!(client.url("/api/v1/pods", &[]).is_err());
    }

    #[test]
    fn test_status_message() {
        assert_eq!(
            status_message(r#"{"kind":"Status","message":"pods \"x\" not found"}"#),
            "pods \"x\" not found"
        );
        assert_eq!(status_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_limiter_window() {
        let mut limiter = RequestLimiter::new(2, Duration::from_secs(1));
        let start = Instant::now();
        assert_eq!(limiter.check_and_record(start), None);
        assert_eq!(limiter.check_and_record(start), None);

        let wait = limiter.check_and_record(start + Duration::from_millis(400));
        assert_eq!(wait, Some(Duration::from_millis(600)));

        // Oldest entries have left the window
        assert_eq!(limiter.check_and_record(start + Duration::from_secs(1)), None);
    }

    #[test]
    fn test_limiter_disabled() {
        let mut limiter = RequestLimiter::new(0, Duration::from_secs(1));
        let now = Instant::now();
        for _ in 0..100 {
            assert_eq!(limiter.check_and_record(now), None);
        }
    }

    #[tokio::test]
    async fn test_unmapped_kind() {
        let client = client("http://127.0.0.1:8080");
        let gvk = GroupVersionKind::new("example.io", "v1", "Widget");
        let err = client.get(&gvk, &ObjectKey::cluster("w")).await.unwrap_err();
        assert!(matches!(err, ClientError::Mapping(_)));
    }
}
