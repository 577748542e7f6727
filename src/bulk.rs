//! Bulk enrollment operations.
//!
//! One request creates, updates or deletes many individual enrollments. When
//! some items fail the service still answers with a result document, tagged
//! with the `BulkRegistryOperationFailure` error code; the transport passes
//! that through as a value so callers see per-item errors in
//! [`BulkEnrollmentOperationResult::errors`].

use serde::{Deserialize, Serialize};

use crate::enrollment::IndividualEnrollment;
use crate::error::{ProvisioningError, Result};

/// Most enrollments the service accepts in one bulk request.
pub const MAX_BULK_ENROLLMENTS: usize = 10_000;

/// What the bulk request does to every enrollment in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkOperationMode {
    /// Create every enrollment; existing ones fail.
    Create,
    /// Create or replace every enrollment.
    Update,
    /// Update only where the enrollment's ETag still matches.
    #[serde(rename = "updateIfMatchETag")]
    UpdateIfMatchETag,
    /// Delete every enrollment.
    Delete,
}

/// A bulk request: one mode applied to a list of enrollments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEnrollmentOperation {
    mode: BulkOperationMode,
    enrollments: Vec<IndividualEnrollment>,
}

impl BulkEnrollmentOperation {
    /// Fails when `enrollments` is empty or over [`MAX_BULK_ENROLLMENTS`].
    pub fn new(mode: BulkOperationMode, enrollments: Vec<IndividualEnrollment>) -> Result<Self> {
        if enrollments.is_empty() {
            return Err(ProvisioningError::Validation(
                "bulk operation needs at least one enrollment".to_string(),
            ));
        }
        if enrollments.len() > MAX_BULK_ENROLLMENTS {
            return Err(ProvisioningError::Validation(format!(
                "bulk operation accepts at most {MAX_BULK_ENROLLMENTS} enrollments, got {}",
                enrollments.len()
            )));
        }
        Ok(BulkEnrollmentOperation { mode, enrollments })
    }

    /// What the request does.
    pub fn mode(&self) -> BulkOperationMode {
        self.mode
    }

    /// Enrollments in request order.
    pub fn enrollments(&self) -> &[IndividualEnrollment] {
        &self.enrollments
    }
}

/// Outcome of a bulk request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEnrollmentOperationResult {
    /// False when at least one enrollment failed.
    pub is_successful: bool,

    /// One entry per failed enrollment.
    #[serde(default)]
    pub errors: Vec<DeviceRegistrationOperationError>,
}

/// Why one enrollment of a bulk request failed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistrationOperationError {
    /// Enrollment that failed.
    pub registration_id: String,
    /// Numeric service error code.
    pub error_code: i64,
    /// Service description of the failure.
    #[serde(default)]
    pub error_status: Option<String>,
}
