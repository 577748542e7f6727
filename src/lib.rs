//! Async Rust client library for the device provisioning service REST API.
//!
//! Provides the enrollment data model (registration records, attestation
//! mechanisms, initial twin state) and `ContractApiHttp`, an authenticated
//! HTTP transport that maps service statuses to typed errors and handles
//! ETag-based optimistic concurrency.
//!
//! # Modules
//!
//! - [`attestation`]: TPM, X509 and symmetric key attestation mechanisms.
//! - [`auth`]: `Authorization` header providers.
//! - [`bulk`]: Bulk enrollment operation request/result types.
//! - [`client`]: `ContractApiHttp`, the request/response pipeline.
//! - [`config`]: Transport configuration.
//! - [`enrollment`]: `IndividualEnrollment` and registration ID validation.
//! - [`error`]: Typed error hierarchy (`ProvisioningError`).
//! - [`error_mapping`]: Status code to error lookup table.
//! - [`etag`]: `ETagHolder` and `If-Match` formatting.
//! - [`individual_enrollments`]: Typed endpoint functions.
//! - [`twin`]: Initial twin state.
//!
//! # Quick Start
//!
//! ```ignore
//! use provisioning_service_client::attestation::AttestationMechanism;
//! use provisioning_service_client::auth::StaticAuthorization;
//! use provisioning_service_client::client::{ContractApiHttp, RequestOptions};
//! use provisioning_service_client::config::ContractApiConfig;
//! use provisioning_service_client::enrollment::IndividualEnrollment;
//! use provisioning_service_client::individual_enrollments::create_or_update_individual_enrollment;
//!
//! let api = ContractApiHttp::new(
//!     ContractApiConfig::new().with_base_url("https://my-dps.azure-devices-provisioning.net"),
//!     StaticAuthorization::new(sas_token),
//! )?;
//! let enrollment = IndividualEnrollment::new("device-01", AttestationMechanism::tpm(ek))?;
//! let stored = create_or_update_individual_enrollment(&api, &enrollment, RequestOptions::new()).await?;
//! ```

#![warn(missing_docs)]

pub mod attestation;
pub mod auth;
pub mod bulk;
pub mod client;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod error_mapping;
pub mod etag;
pub mod individual_enrollments;
pub mod twin;

pub use client::{ContractApiHttp, Payload, RequestOptions};
pub use enrollment::IndividualEnrollment;
pub use error::{ProvisioningError, Result, ServiceErrorKind};
