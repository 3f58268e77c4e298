//! HTTP request pipeline for the panel API

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use ptero_api::errors::ApiErrors;
use ptero_api::responses::{DataWrapper, Item, Listing};

use crate::emitter::Emitter;
use crate::error::{Error, Result};
use crate::query::Query;

/// Names of the observability hook events fired by the pipeline.
pub mod hook {
    /// Request/response breadcrumbs (payload: message string)
    pub const DEBUG: &str = "debug";
    /// Decoded JSON body of every successful response
    pub const RECEIVE: &str = "receive";
    /// Decoded error set of every rejected request
    pub const ERROR: &str = "error";
}

const JSON: &str = "application/json";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Which half of the panel API a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKind {
    Application,
    Client,
}

impl ApiKind {
    pub(crate) fn segment(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Client => "client",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Application => "Application",
            Self::Client => "Client",
        }
    }
}

/// HTTP verbs accepted by the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PATCH" => Ok(Self::Patch),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::Validation(format!("invalid http method '{other}'"))),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request body: structured JSON, or raw bytes sent unmodified.
#[derive(Debug, Clone)]
pub enum Body {
    Json(Value),
    Raw(Vec<u8>),
}

/// Per-call options for [`RequestManager::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub body: Option<Body>,
    /// Content type of the body; defaults to `application/json`.
    pub content_type: Option<String>,
    pub query: Query,
}

impl RequestOptions {
    /// JSON body options from any serializable value.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if the value cannot be represented as
    /// JSON.
    pub fn json(body: &impl Serialize) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::Validation(format!("unserializable request body: {e}")))?;
        Ok(Self {
            body: Some(Body::Json(value)),
            ..Self::default()
        })
    }

    /// Raw byte body options with an explicit content type.
    pub fn raw(body: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            body: Some(Body::Raw(body)),
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }

    pub fn with_query(query: Query) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }
}

/// A classified successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 204: accepted, no content
    Empty,
    /// 2xx with a JSON content type
    Json(Value),
    /// 2xx with any other content type
    Text(String),
}

impl Payload {
    /// # Errors
    /// Returns [`Error::Request`] if the response carried no JSON body.
    pub fn into_json(self) -> Result<Value> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Empty => Err(Error::Request("expected a json body, got no content".into())),
            Self::Text(_) => Err(Error::Request("expected a json body, got plain text".into())),
        }
    }

    /// # Errors
    /// Returns [`Error::Request`] if the response carried no text body.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Empty => Ok(String::new()),
            Self::Json(_) => Err(Error::Request("expected a text body, got json".into())),
        }
    }

    /// Deserializes the JSON body into `T`.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T> {
        serde_json::from_value(self.into_json()?)
            .map_err(|e| Error::Request(format!("unexpected response shape: {e}")))
    }

    /// Unwraps a single-resource envelope down to its attributes.
    pub fn attributes<T: DeserializeOwned>(self) -> Result<T> {
        self.deserialize::<Item<T>>().map(|item| item.attributes)
    }

    /// Unwraps a collection envelope down to its attributes, in order.
    pub fn listing<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        self.deserialize::<Listing<T>>()
            .map(Listing::into_attributes)
    }

    /// Unwraps a bare `data` object envelope.
    pub fn wrapped<T: DeserializeOwned>(self) -> Result<T> {
        self.deserialize::<DataWrapper<T>>().map(|w| w.data)
    }
}

/// Executes authenticated HTTP calls against the panel API.
///
/// One manager per API key; individual calls are independent and may run
/// concurrently. Register `debug`/`receive`/`error` hooks on the
/// [`Emitter`] for observability.
pub struct RequestManager {
    kind: ApiKind,
    base_url: String,
    key: String,
    client: reqwest::Client,
    emitter: Emitter,
    ping: Mutex<Option<Duration>>,
}

impl RequestManager {
    /// Create a manager with the default HTTP client (60 second timeout).
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if the base URL is not absolute.
    pub fn new(kind: ApiKind, base_url: &str, key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Self::with_client(kind, base_url, key, client)
    }

    /// Create a manager over a custom `reqwest::Client` (for timeout,
    /// proxy or TLS policies the default client does not cover).
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if the base URL is not absolute.
    pub fn with_client(
        kind: ApiKind,
        base_url: &str,
        key: &str,
        client: reqwest::Client,
    ) -> Result<Self> {
        Url::parse(base_url).map_err(|e| Error::Validation(format!("invalid base url: {e}")))?;

        Ok(Self {
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            client,
            emitter: Emitter::new(),
            ping: Mutex::new(None),
        })
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Round-trip latency of the most recent request.
    pub fn ping(&self) -> Option<Duration> {
        *self.ping.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Execute one call against the panel API.
    ///
    /// # Errors
    /// [`Error::Api`] for 4xx responses, [`Error::Request`] for transport
    /// failures and any other unacceptable status.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        opts: RequestOptions,
    ) -> Result<Payload> {
        let route = format!("/api/{}{}", self.kind.segment(), path);
        let url = format!("{}{}{}", self.base_url, route, opts.query);
        let content_type = opts.content_type.as_deref().unwrap_or(JSON);

        let body = match opts.body {
            Some(Body::Json(value)) => Some(
                serde_json::to_vec(&value)
                    .map_err(|e| Error::Validation(format!("unserializable request body: {e}")))?,
            ),
            Some(Body::Raw(bytes)) => Some(bytes),
            None => None,
        };

        self.emit_hook(hook::DEBUG, Value::String(format!("request: {method} {route}")))
            .await;
        tracing::debug!(%method, route, "sending request");

        let mut builder = self
            .client
            .request(method.into(), &url)
            .header(USER_AGENT, self.user_agent())
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, "application/json,text/plain")
            .header(AUTHORIZATION, format!("Bearer {}", self.key));
        if let Some(bytes) = body {
            builder = builder.body(bytes);
        }

        let started = Instant::now();
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let response_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let text = response.text().await?;

        let elapsed = started.elapsed();
        self.set_ping(elapsed);

        self.emit_hook(
            hook::DEBUG,
            Value::String(format!(
                "response: {status} ({}, {} bytes)",
                response_type.as_deref().unwrap_or("no content type"),
                text.len()
            )),
        )
        .await;
        tracing::debug!(status, elapsed_ms = elapsed.as_millis() as u64, "response received");

        match classify(status, response_type.as_deref(), &text) {
            Ok(payload) => {
                if let Payload::Json(value) = &payload {
                    self.emit_hook(hook::RECEIVE, value.clone()).await;
                }
                Ok(payload)
            }
            Err(err) => {
                if let Error::Api(errors) = &err {
                    let body = serde_json::to_value(errors).unwrap_or(Value::Null);
                    self.emit_hook(hook::ERROR, body).await;
                }
                Err(err)
            }
        }
    }

    /// Follow a pre-signed URL handed out by the API (file and backup
    /// download links). Pre-signed URLs carry their own credentials, so no
    /// bearer header is attached; any failure is a plain
    /// [`Error::Request`] since these services do not speak the panel's
    /// error envelope.
    pub async fn raw(&self, method: Method, url: &str, accept: &str) -> Result<Payload> {
        Url::parse(url).map_err(|e| Error::Validation(format!("invalid raw url: {e}")))?;

        self.emit_hook(hook::DEBUG, Value::String(format!("raw request: {method} {url}")))
            .await;

        let response = self
            .client
            .request(method.into(), url)
            .header(USER_AGENT, self.user_agent())
            .header(ACCEPT, accept)
            .send()
            .await?;

        let status = response.status().as_u16();
        let response_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let text = response.text().await?;

        match classify(status, response_type.as_deref(), &text) {
            Err(Error::Api(errors)) => Err(Error::Request(format!(
                "raw fetch failed (status: {status}): {errors}"
            ))),
            other => other,
        }
    }

    pub async fn get(&self, path: &str) -> Result<Payload> {
        self.request(Method::Get, path, RequestOptions::default())
            .await
    }

    pub async fn get_with(&self, path: &str, query: Query) -> Result<Payload> {
        self.request(Method::Get, path, RequestOptions::with_query(query))
            .await
    }

    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Payload> {
        self.request(Method::Post, path, RequestOptions::json(body)?)
            .await
    }

    /// POST with no body (action endpoints).
    pub async fn post_empty(&self, path: &str) -> Result<Payload> {
        self.request(Method::Post, path, RequestOptions::default())
            .await
    }

    pub async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<Payload> {
        self.request(Method::Put, path, RequestOptions::json(body)?)
            .await
    }

    pub async fn patch<T: Serialize>(&self, path: &str, body: &T) -> Result<Payload> {
        self.request(Method::Patch, path, RequestOptions::json(body)?)
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Payload> {
        self.request(Method::Delete, path, RequestOptions::default())
            .await
    }

    pub async fn delete_with<T: Serialize>(&self, path: &str, body: &T) -> Result<Payload> {
        self.request(Method::Delete, path, RequestOptions::json(body)?)
            .await
    }

    fn user_agent(&self) -> String {
        format!(
            "{} ptero-rs v{}",
            self.kind.title(),
            env!("CARGO_PKG_VERSION")
        )
    }

    fn set_ping(&self, elapsed: Duration) {
        *self.ping.lock().unwrap_or_else(|e| e.into_inner()) = Some(elapsed);
    }

    // Hooks are observability, not control flow: a broken handler is
    // logged, never allowed to fail the request it was watching.
    async fn emit_hook(&self, name: &str, payload: Value) {
        if let Err(err) = self.emitter.emit(name, payload).await {
            tracing::warn!("{name} hook failed: {err}");
        }
    }
}

impl fmt::Debug for RequestManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestManager")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Classify a response by status code, content type and body.
fn classify(status: u16, content_type: Option<&str>, body: &str) -> Result<Payload> {
    match status {
        204 => Ok(Payload::Empty),
        200 | 201 | 202 => {
            if content_type.is_some_and(|c| c.starts_with(JSON)) {
                let value = serde_json::from_str(body).map_err(|e| {
                    Error::Request(format!("undecodable json response body: {e}"))
                })?;
                Ok(Payload::Json(value))
            } else {
                Ok(Payload::Text(body.to_owned()))
            }
        }
        400..=499 => {
            let errors: ApiErrors = serde_json::from_str(body).map_err(|e| {
                Error::Request(format!("undecodable error body (status {status}): {e}"))
            })?;
            if errors.is_empty() {
                return Err(Error::Request(format!(
                    "panel returned an empty error set (status {status})"
                )));
            }
            Err(Error::Api(errors))
        }
        other => Err(Error::Request(format!(
            "panel returned an invalid or unacceptable response (status: {other})"
        ))),
    }
}
