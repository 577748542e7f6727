//! Status-code to error lookup used by the transport.
//!
//! `ContractApiHttp` holds one immutable default table. A call can pass its
//! own table in [`crate::client::RequestOptions`]; at failure time the call
//! table is layered over the defaults and the status is looked up in the
//! merged result. Statuses missing from both tables become
//! [`ServiceErrorKind::Transient`].

use std::collections::BTreeMap;

use reqwest::StatusCode;

use crate::error::{ProvisioningError, ServiceErrorKind};

/// Builds the error for a rejected response from its status and raw body.
pub type ErrorFactory = fn(StatusCode, &str) -> ProvisioningError;

/// Ordered status code to [`ErrorFactory`] table.
#[derive(Debug, Clone, Default)]
pub struct ErrorMapping {
    entries: BTreeMap<StatusCode, ErrorFactory>,
}

impl ErrorMapping {
    /// An empty table. Every non-success status maps to the generic
    /// transient error.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table every `ContractApiHttp` starts with.
    ///
    /// 412 is deliberately absent: conditional writes opt in per call.
    pub fn service_defaults() -> Self {
        Self::new()
            .with(StatusCode::BAD_REQUEST, |s, b| {
                ProvisioningError::service(ServiceErrorKind::BadRequest, s, b)
            })
            .with(StatusCode::UNAUTHORIZED, |s, b| {
                ProvisioningError::service(ServiceErrorKind::Unauthorized, s, b)
            })
            .with(StatusCode::FORBIDDEN, |s, b| {
                ProvisioningError::service(ServiceErrorKind::QuotaExceeded, s, b)
            })
            .with(StatusCode::NOT_FOUND, |s, b| {
                ProvisioningError::service(ServiceErrorKind::NotFound, s, b)
            })
            .with(StatusCode::CONFLICT, |s, b| {
                ProvisioningError::service(ServiceErrorKind::Conflict, s, b)
            })
            .with(StatusCode::PAYLOAD_TOO_LARGE, |s, b| {
                ProvisioningError::service(ServiceErrorKind::PayloadTooLarge, s, b)
            })
            .with(StatusCode::TOO_MANY_REQUESTS, |s, b| {
                ProvisioningError::service(ServiceErrorKind::Throttled, s, b)
            })
            .with(StatusCode::INTERNAL_SERVER_ERROR, |s, b| {
                ProvisioningError::service(ServiceErrorKind::InternalServerError, s, b)
            })
            .with(StatusCode::SERVICE_UNAVAILABLE, |s, b| {
                ProvisioningError::service(ServiceErrorKind::ServiceUnavailable, s, b)
            })
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, status: StatusCode, factory: ErrorFactory) -> Self {
        self.insert(status, factory);
        self
    }

    /// Registers `factory` for `status`, replacing any previous entry.
    pub fn insert(&mut self, status: StatusCode, factory: ErrorFactory) {
        self.entries.insert(status, factory);
    }

    /// Factory mapped to `status`.
    pub fn get(&self, status: StatusCode) -> Option<ErrorFactory> {
        self.entries.get(&status).copied()
    }

    /// Whether `status` has a mapping.
    pub fn contains(&self, status: StatusCode) -> bool {
        self.entries.contains_key(&status)
    }

    /// Number of mapped statuses.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `defaults` with every entry of `self` written on top.
    pub fn merged_over(&self, defaults: &ErrorMapping) -> ErrorMapping {
        let mut merged = defaults.clone();
        merged.entries.extend(self.entries.iter().map(|(k, v)| (*k, *v)));
        merged
    }

    /// Produces the error for a rejected response.
    pub fn map_response(&self, status: StatusCode, body: &str) -> ProvisioningError {
        match self.get(status) {
            Some(factory) => factory(status, body),
            None => ProvisioningError::service(ServiceErrorKind::Transient, status, body),
        }
    }
}
