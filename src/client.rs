//! Authenticated HTTP transport for the provisioning service REST API.
//!
//! `ContractApiHttp` runs one request/response exchange per call:
//!
//! 1. Resolve the path against the base address, attach `Authorization`
//!    (from the [`AuthorizationProvider`]) and `User-Agent`.
//! 2. Apply call headers, including a quoted `If-Match` when requested.
//! 3. Attach the [`Payload`], if any, with its content type.
//! 4. Send on the default-timeout client, or on the per-call client raced
//!    against the call's timeout. Either way the caller's
//!    `CancellationToken` can abort the exchange.
//! 5. Success (or 404 on GET, which yields a default value) deserializes the
//!    body. A response `ETag` header overwrites the body's `etag` field.
//! 6. Anything else goes through the error mapping table.
//!
//! There is no retry: exactly one request is attempted per call.
//!
//! The two `reqwest::Client`s live behind an open/closed state. `close()`
//! drops them; later calls fail with `ProvisioningError::Client` and a second
//! `close()` does nothing.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{
    AUTHORIZATION, CONTENT_TYPE, ETAG, HeaderMap, HeaderName, HeaderValue, IF_MATCH, USER_AGENT,
};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::AuthorizationProvider;
use crate::config::ContractApiConfig;
use crate::error::{ProvisioningError, Result};
use crate::error_mapping::ErrorMapping;
use crate::etag::{ETagHolder, if_match_value};

/// Response header carrying the service's symbolic error code.
pub const ERROR_CODE_HEADER: &str = "iothub-errorcode";

/// Error code the service sends when a bulk operation partially failed. The
/// body is a regular bulk result, so it is never turned into an error.
pub const BULK_OPERATION_FAILURE: &str = "BulkRegistryOperationFailure";

/// Content type of serialized JSON payloads.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

// ── Request parts ──────────────────────────────────────────────────────

/// A request body together with its content type.
#[derive(Debug, Clone)]
pub struct Payload {
    content: Bytes,
    content_type: String,
}

impl Payload {
    /// Serializes `body` as UTF-8 JSON.
    pub fn json<B: Serialize + ?Sized>(body: &B) -> Result<Self> {
        let content = serde_json::to_vec(body)?;
        Ok(Payload {
            content: Bytes::from(content),
            content_type: JSON_CONTENT_TYPE.to_string(),
        })
    }

    /// Pre-serialized bytes sent as-is.
    pub fn raw(content: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Payload {
            content: content.into(),
            content_type: content_type.into(),
        }
    }

    /// Pre-serialized text sent as-is.
    pub fn text(content: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::raw(Bytes::from(content.into()), content_type)
    }

    /// Body bytes.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// `Content-Type` sent with the body.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

/// Per-call settings: extra headers, error mapping overrides, timeout and
/// cancellation.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
    if_match: Option<String>,
    error_mapping: ErrorMapping,
    timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
}

impl RequestOptions {
    /// No headers, no overrides, transport default timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom header. Names and values are validated when the request
    /// is built.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sends `If-Match` with `etag`, quoted if needed.
    #[must_use]
    pub fn with_if_match(mut self, etag: &str) -> Self {
        self.if_match = Some(if_match_value(etag));
        self
    }

    /// Sends `If-Match` with the entity's ETag. Fails when the entity has
    /// none.
    pub fn with_if_match_from<E: ETagHolder + ?Sized>(self, entity: &E) -> Result<Self> {
        match entity.etag().filter(|e| !e.trim().is_empty()) {
            Some(etag) => Ok(self.with_if_match(etag)),
            None => Err(ProvisioningError::Validation(
                "the entity does not have its ETag set".to_string(),
            )),
        }
    }

    /// Status mappings layered over the transport defaults for this call.
    #[must_use]
    pub fn with_error_mapping(mut self, mapping: ErrorMapping) -> Self {
        self.error_mapping = mapping;
        self
    }

    /// Replaces the default timeout for this call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Aborts the call when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Overrides set for this call.
    pub fn error_mapping(&self) -> &ErrorMapping {
        &self.error_mapping
    }

    /// The formatted `If-Match` value, if any.
    pub fn if_match(&self) -> Option<&str> {
        self.if_match.as_deref()
    }

    /// Per-call timeout, if set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

// ── Transport ──────────────────────────────────────────────────────────

/// The two pooled clients. Cloning is an `Arc` bump.
#[derive(Clone)]
struct HttpClients {
    /// Carries the configured default timeout.
    default: Client,
    /// No client-level timeout; the call's own timeout bounds it.
    per_call: Client,
}

/// What came back from the wire, read in full.
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

/// Authenticated HTTP transport for the provisioning service.
///
/// `Send + Sync`: share it behind an `Arc` and issue calls concurrently.
pub struct ContractApiHttp {
    base_url: String,
    user_agent: String,
    default_timeout: Duration,
    auth: Arc<dyn AuthorizationProvider>,
    default_errors: ErrorMapping,
    clients: RwLock<Option<HttpClients>>,
}

impl ContractApiHttp {
    /// Builds both HTTP clients from `config`.
    pub fn new(config: ContractApiConfig, auth: impl AuthorizationProvider + 'static) -> Result<Self> {
        Self::with_provider(config, Arc::new(auth))
    }

    /// Like [`new`](Self::new) for a provider that is already shared.
    pub fn with_provider(
        config: ContractApiConfig,
        auth: Arc<dyn AuthorizationProvider>,
    ) -> Result<Self> {
        let default = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.default_timeout)
            .build()?;
        let per_call = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(ContractApiHttp {
            base_url: config.base_url,
            user_agent: config.user_agent,
            default_timeout: config.default_timeout,
            auth,
            default_errors: ErrorMapping::service_defaults(),
            clients: RwLock::new(Some(HttpClients { default, per_call })),
        })
    }

    /// Replaces the default error mapping table.
    #[must_use]
    pub fn with_default_error_mapping(mut self, mapping: ErrorMapping) -> Self {
        self.default_errors = mapping;
        self
    }

    /// Address request paths are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Releases both HTTP clients. Idempotent.
    pub fn close(&self) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        if clients.take().is_some() {
            debug!(base_url = %self.base_url, "closed provisioning transport");
        }
    }

    /// True after [`close`](Self::close).
    pub fn is_closed(&self) -> bool {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn clients(&self) -> Result<HttpClients> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ProvisioningError::Client("transport has been closed".to_string()))
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Core pipeline shared by every verb.
    ///
    /// `T` is deserialized from the response body. An empty body reads as
    /// JSON `null`, so `()` and `Option<_>` work for bodiless answers.
    ///
    /// The 404-default rule is not applied here: a 404 on GET reads as
    /// `null`, so a `T` that cannot be built from `null` fails with
    /// [`ProvisioningError::Parse`]. Use [`get`](Self::get) to receive
    /// `T::default()` instead.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Payload>,
        options: RequestOptions,
    ) -> Result<T> {
        let value = self
            .exchange(method, path, payload, options)
            .await?
            .unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// GET `path`. A 404 yields `T::default()`.
    pub async fn get<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T> {
        match self.exchange(Method::GET, path, None, options).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(T::default()),
        }
    }

    /// PUT `payload` to `path`.
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<T> {
        self.execute(Method::PUT, path, Some(payload), options).await
    }

    /// POST `payload` to `path`.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Payload,
        options: RequestOptions,
    ) -> Result<T> {
        self.execute(Method::POST, path, Some(payload), options).await
    }

    /// DELETE `path`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> Result<T> {
        self.execute(Method::DELETE, path, None, options).await
    }

    /// PUT an entity as JSON, sending `If-Match` when it carries an ETag.
    pub async fn put_entity<E, T>(&self, path: &str, entity: &E, options: RequestOptions) -> Result<T>
    where
        E: Serialize + ETagHolder,
        T: DeserializeOwned,
    {
        let options = match entity.etag() {
            Some(etag) if !etag.trim().is_empty() => options.with_if_match(etag),
            _ => options,
        };
        self.put(path, Payload::json(entity)?, options).await
    }

    /// DELETE the entity at `path` on condition that its ETag still matches.
    pub async fn delete_entity<E>(&self, path: &str, entity: &E, options: RequestOptions) -> Result<()>
    where
        E: ETagHolder + ?Sized,
    {
        let options = options.with_if_match_from(entity)?;
        self.delete::<IgnoredAny>(path, options).await?;
        Ok(())
    }

    /// Sends the request and returns the JSON body, `None` for a GET 404.
    async fn exchange(
        &self,
        method: Method,
        path: &str,
        payload: Option<Payload>,
        options: RequestOptions,
    ) -> Result<Option<serde_json::Value>> {
        let clients = self.clients()?;
        let client = if options.timeout.is_some() {
            &clients.per_call
        } else {
            &clients.default
        };

        let request = self.build_request(client, method.clone(), path, payload, &options)?;
        let cancellation = options.cancellation.clone().unwrap_or_default();
        let timeout = options.timeout.unwrap_or(self.default_timeout);

        debug!(%method, path, ?timeout, "sending request");

        let exchange = async {
            let response = client.execute(request).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            Ok::<_, ProvisioningError>(RawResponse {
                status,
                headers,
                body,
            })
        };

        let response = match options.timeout {
            Some(limit) => {
                tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => Err(cancelled()),
                    _ = tokio::time::sleep(limit) => Err(ProvisioningError::transport(
                        format!("request timed out after {limit:?}"),
                    )),
                    result = exchange => result,
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => Err(cancelled()),
                    result = exchange => result,
                }
            }
        };

        let response = match response {
            Ok(response) => response,
            // A client-side abort that raced a reqwest failure is still the
            // caller's cancellation.
            Err(_) if cancellation.is_cancelled() => return Err(cancelled()),
            Err(err) => {
                warn!(%method, path, error = %err, "request failed before a response arrived");
                return Err(err);
            }
        };

        debug!(%method, path, status = %response.status, "received response");
        self.interpret(&method, path, response, &options)
    }

    fn build_request(
        &self,
        client: &Client,
        method: Method,
        path: &str,
        payload: Option<Payload>,
        options: &RequestOptions,
    ) -> Result<reqwest::Request> {
        let mut headers = HeaderMap::new();

        let mut authorization = header_value(&self.auth.authorization_header()?)?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(USER_AGENT, header_value(&self.user_agent)?);

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ProvisioningError::Validation(format!("invalid header name: {name:?}"))
            })?;
            headers.insert(name, header_value(value)?);
        }
        if let Some(etag) = &options.if_match {
            headers.insert(IF_MATCH, header_value(etag)?);
        }

        let mut builder = client.request(method, self.url(path)).headers(headers);
        if let Some(payload) = payload {
            builder = builder
                .header(CONTENT_TYPE, header_value(&payload.content_type)?)
                .body(payload.content);
        }
        Ok(builder.build()?)
    }

    fn interpret(
        &self,
        method: &Method,
        path: &str,
        response: RawResponse,
        options: &RequestOptions,
    ) -> Result<Option<serde_json::Value>> {
        let RawResponse {
            status,
            headers,
            body,
        } = response;

        if !status.is_success() && !is_bulk_operation_failure(&headers) {
            if status == StatusCode::NOT_FOUND && *method == Method::GET {
                debug!(path, "entity not found, returning default");
                return Ok(None);
            }
            let body = String::from_utf8_lossy(&body);
            let errors = options.error_mapping.merged_over(&self.default_errors);
            let err = errors.map_response(status, &body);
            warn!(%method, path, %status, error = %err, "service rejected request");
            return Err(err);
        }

        let mut value = if body.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body)?
        };

        if let Some(etag) = headers.get(ETAG).and_then(|v| v.to_str().ok()) {
            if let serde_json::Value::Object(fields) = &mut value {
                fields.insert("etag".to_string(), serde_json::Value::String(etag.trim().to_string()));
            }
        }

        Ok(Some(value))
    }
}

impl Drop for ContractApiHttp {
    fn drop(&mut self) {
        self.close();
    }
}

fn cancelled() -> ProvisioningError {
    ProvisioningError::Client("operation was cancelled by the caller".to_string())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| ProvisioningError::Validation("header value contains invalid characters".to_string()))
}

fn is_bulk_operation_failure(headers: &HeaderMap) -> bool {
    headers
        .get(ERROR_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|code| code.trim() == BULK_OPERATION_FAILURE)
}
