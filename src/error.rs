//! Typed error hierarchy for the provisioning-service-client crate.
//!
//! `ProvisioningError` separates failures by where they happen, so callers can
//! tell a request that never left the process from one the service rejected:
//!
//! - `Validation`: malformed input caught before any network call. These are
//!   programmer errors and are never worth retrying.
//! - `Transport` / `Parse`: the exchange itself failed (timeout, DNS, TCP,
//!   TLS, or a body that could not be (de)serialized).
//! - `Service`: the service answered with a non-success status. The `kind`
//!   comes from the status-code mapping table (see [`crate::error_mapping`]).
//! - `Client`: the SDK refused to complete the call: caller-requested
//!   cancellation, use after `close()`, or a service payload missing its ETag.

use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;

/// Unified error type for all provisioning-service-client operations.
#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    /// Input rejected before any request was sent.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// The HTTP exchange did not complete: timeout, connection failure,
    /// or a request that could not be built.
    #[error("transport failure: {message}")]
    Transport {
        /// What went wrong, including the elapsed timeout when relevant.
        message: String,
        /// The underlying reqwest error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The service returned a non-success status code.
    #[error("service error {status} ({kind}): {message}")]
    Service {
        /// Classification from the error mapping table.
        kind: ServiceErrorKind,
        /// The HTTP status code returned by the service.
        status: StatusCode,
        /// Numeric service error code, when the body is a service error document.
        error_code: Option<i64>,
        /// Service-side tracking id for support requests.
        tracking_id: Option<String>,
        /// The service's message, or the raw body when it is not a
        /// service error document.
        message: String,
    },

    /// The SDK refused to complete the call.
    #[error("client error: {0}")]
    Client(String),

    /// JSON serialization or deserialization failed.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Closed set of service failure classes produced by the error mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    /// 400: the service rejected the request shape or arguments.
    BadRequest,
    /// 401: the authorization header was missing, expired, or wrong.
    Unauthorized,
    /// 403: the caller exceeded a quota or lacks permission.
    QuotaExceeded,
    /// 404 on a non-GET call: the target entity does not exist.
    NotFound,
    /// 409: the entity already exists.
    Conflict,
    /// 412: the `If-Match` ETag no longer matches the stored entity.
    PreconditionFailed,
    /// 413: the payload exceeds the service limit.
    PayloadTooLarge,
    /// 429: the caller is being throttled.
    Throttled,
    /// 500: the service failed internally.
    InternalServerError,
    /// 503: the service is temporarily unavailable.
    ServiceUnavailable,
    /// Any non-success status without a specific mapping.
    Transient,
}

impl ServiceErrorKind {
    /// Whether a later identical request may succeed.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Throttled | Self::InternalServerError | Self::ServiceUnavailable | Self::Transient
        )
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::QuotaExceeded => "quota exceeded",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::PreconditionFailed => "precondition failed",
            Self::PayloadTooLarge => "payload too large",
            Self::Throttled => "throttled",
            Self::InternalServerError => "internal server error",
            Self::ServiceUnavailable => "service unavailable",
            Self::Transient => "transient",
        };
        f.write_str(name)
    }
}

/// Error document the service returns alongside non-success statuses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceErrorDetails {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    tracking_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ProvisioningError {
    /// Builds a `Service` error, lifting the service error document out of
    /// `body` when it parses as one.
    pub fn service(kind: ServiceErrorKind, status: StatusCode, body: &str) -> Self {
        let details = serde_json::from_str::<ServiceErrorDetails>(body).ok();
        let (error_code, tracking_id, message) = match details {
            Some(d) => (
                d.error_code,
                d.tracking_id,
                d.message.unwrap_or_else(|| body.to_string()),
            ),
            None => (None, None, body.to_string()),
        };
        ProvisioningError::Service {
            kind,
            status,
            error_code,
            tracking_id,
            message,
        }
    }

    /// Builds a `Transport` error without an underlying cause.
    pub fn transport(message: impl Into<String>) -> Self {
        ProvisioningError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// True for failures where the request never produced a service answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Parse(_))
    }

    /// True when retrying the same request could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Service { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }

    /// The service error class, for `Service` errors.
    pub fn service_kind(&self) -> Option<ServiceErrorKind> {
        match self {
            Self::Service { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProvisioningError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "connection failed".to_string()
        } else if err.is_builder() {
            "request could not be built".to_string()
        } else {
            "request failed".to_string()
        };
        ProvisioningError::Transport {
            message,
            source: Some(Box::new(err)),
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, ProvisioningError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn service_error_lifts_service_document() {
        let body = r#"{
            "errorCode": 412002,
            "trackingId": "f3a9c0de-tracking",
            "message": "Precondition failed: etag mismatch",
            "timestampUtc": "2024-05-01T10:00:00Z"
        }"#;
        let err = ProvisioningError::service(
            ServiceErrorKind::PreconditionFailed,
            StatusCode::PRECONDITION_FAILED,
            body,
        );
        match &err {
            ProvisioningError::Service {
                error_code,
                tracking_id,
                message,
                ..
            } => {
                assert_eq!(*error_code, Some(412002));
                assert_eq!(tracking_id.as_deref(), Some("f3a9c0de-tracking"));
                assert_eq!(message, "Precondition failed: etag mismatch");
            }
            other => panic!("expected Service, got {other:?}"),
        }
        let msg = err.to_string();
        assert!(msg.contains("412"), "display should include status code");
        assert!(msg.contains("precondition failed"));
    }

    #[test]
    fn service_error_keeps_raw_body_when_not_a_document() {
        let err = ProvisioningError::service(
            ServiceErrorKind::Transient,
            StatusCode::BAD_GATEWAY,
            "upstream exploded",
        );
        assert!(err.to_string().contains("upstream exploded"));
        assert!(err.is_transient());
        assert!(!err.is_transport());
    }

    #[test]
    fn validation_and_client_errors_are_not_transient() {
        assert!(!ProvisioningError::Validation("bad id".into()).is_transient());
        assert!(!ProvisioningError::Client("cancelled".into()).is_transient());
    }

    #[test]
    fn conflict_is_not_transient_but_throttled_is() {
        assert!(!ServiceErrorKind::Conflict.is_transient());
        assert!(ServiceErrorKind::Throttled.is_transient());
        assert!(ServiceErrorKind::ServiceUnavailable.is_transient());
    }

    #[test]
    fn parse_error_counts_as_transport() {
        let json_err: serde_json::Error =
            serde_json::from_str::<String>("{{bad json}}").unwrap_err();
        let err = ProvisioningError::Parse(json_err);
        assert!(err.is_transport());
        assert!(err.source().is_some(), "Parse should chain to serde_json::Error");
    }

    #[test]
    fn transport_error_displays_message() {
        let err = ProvisioningError::transport("request timed out after 2s");
        assert_eq!(err.to_string(), "transport failure: request timed out after 2s");
        assert!(err.is_transport());
        assert!(err.service_kind().is_none());
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProvisioningError>();
    }
}
