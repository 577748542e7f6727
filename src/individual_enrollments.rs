//! Individual enrollment endpoints of the provisioning service.
//!
//! | Function | API Path |
//! |----------|----------|
//! | [`create_or_update_individual_enrollment`] | PUT `/enrollments/{id}` |
//! | [`get_individual_enrollment`] | GET `/enrollments/{id}` |
//! | [`delete_individual_enrollment`] | DELETE `/enrollments/{id}` (conditional) |
//! | [`delete_individual_enrollment_by_id`] | DELETE `/enrollments/{id}` |
//! | [`run_bulk_enrollment_operation`] | POST `/enrollments` |
//!
//! Every path carries the `api-version` query parameter. Registration IDs
//! are validated before anything is sent.

use reqwest::StatusCode;
use serde::de::IgnoredAny;

use crate::bulk::{BulkEnrollmentOperation, BulkEnrollmentOperationResult};
use crate::client::{ContractApiHttp, Payload, RequestOptions};
use crate::enrollment::{IndividualEnrollment, validate_registration_id};
use crate::error::{ProvisioningError, ServiceErrorKind};
use crate::error_mapping::ErrorMapping;

/// Service API version these endpoints speak.
pub const API_VERSION: &str = "2021-10-01";

fn enrollment_path(registration_id: &str) -> crate::error::Result<String> {
    validate_registration_id(registration_id)?;
    Ok(format!("enrollments/{registration_id}?api-version={API_VERSION}"))
}

/// Conditional writes surface a stale ETag as its own error kind.
fn conditional_errors() -> ErrorMapping {
    ErrorMapping::new().with(StatusCode::PRECONDITION_FAILED, |status, body| {
        ProvisioningError::service(ServiceErrorKind::PreconditionFailed, status, body)
    })
}

/// Adds the 412 mapping underneath whatever the caller mapped.
fn with_conditional_errors(options: RequestOptions) -> RequestOptions {
    let merged = options.error_mapping().merged_over(&conditional_errors());
    options.with_error_mapping(merged)
}

/// Creates the enrollment, or replaces it when it exists.
///
/// An enrollment read back from the service carries its ETag, which is sent
/// as `If-Match`; if someone changed the enrollment in between, the call
/// fails with [`ServiceErrorKind::PreconditionFailed`]. A freshly built
/// enrollment has no ETag and is written unconditionally.
///
/// Returns the stored enrollment with its new ETag and timestamps.
pub async fn create_or_update_individual_enrollment(
    api: &ContractApiHttp,
    enrollment: &IndividualEnrollment,
    options: RequestOptions,
) -> crate::error::Result<IndividualEnrollment> {
    let path = enrollment_path(enrollment.registration_id())?;
    let stored: serde_json::Value = api
        .put_entity(&path, enrollment, with_conditional_errors(options))
        .await?;
    IndividualEnrollment::from_service_value(stored)
}

/// Fetches an enrollment. `None` when no enrollment has that ID.
///
/// A stored enrollment without an ETag is a [`ProvisioningError::Client`].
pub async fn get_individual_enrollment(
    api: &ContractApiHttp,
    registration_id: &str,
    options: RequestOptions,
) -> crate::error::Result<Option<IndividualEnrollment>> {
    let path = enrollment_path(registration_id)?;
    let found: Option<serde_json::Value> = api.get(&path, options).await?;
    found.map(IndividualEnrollment::from_service_value).transpose()
}

/// Deletes the enrollment if its ETag still matches the stored one.
///
/// Fails with a validation error, before sending, when the enrollment has
/// no ETag.
pub async fn delete_individual_enrollment(
    api: &ContractApiHttp,
    enrollment: &IndividualEnrollment,
    options: RequestOptions,
) -> crate::error::Result<()> {
    let path = enrollment_path(enrollment.registration_id())?;
    api.delete_entity(&path, enrollment, with_conditional_errors(options))
        .await
}

/// Deletes the enrollment regardless of its current version.
pub async fn delete_individual_enrollment_by_id(
    api: &ContractApiHttp,
    registration_id: &str,
    options: RequestOptions,
) -> crate::error::Result<()> {
    let path = enrollment_path(registration_id)?;
    api.delete::<IgnoredAny>(&path, options).await?;
    Ok(())
}

/// Runs a bulk create/update/delete.
///
/// Partial failures are not errors: inspect
/// [`BulkEnrollmentOperationResult::errors`].
pub async fn run_bulk_enrollment_operation(
    api: &ContractApiHttp,
    operation: &BulkEnrollmentOperation,
    options: RequestOptions,
) -> crate::error::Result<BulkEnrollmentOperationResult> {
    let path = format!("enrollments?api-version={API_VERSION}");
    api.post(&path, Payload::json(operation)?, options).await
}
