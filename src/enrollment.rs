//! Individual enrollment: the registration record of a single device.
//!
//! An [`IndividualEnrollment`] is either built client-side with
//! [`IndividualEnrollment::new`] (validated, no ETag yet) or read back from
//! the service, in which case the ETag and timestamps are populated. Reading
//! a payload without an `etag` fails: the ETag is what makes later
//! conditional updates and deletes possible.
//!
//! Reference: <https://learn.microsoft.com/en-us/rest/api/iot-dps/service/individual-enrollment>

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attestation::AttestationMechanism;
use crate::error::{ProvisioningError, Result};
use crate::etag::ETagHolder;
use crate::twin::TwinState;

/// Longest registration ID the service accepts.
pub const MAX_REGISTRATION_ID_LEN: usize = 128;

/// Whether the service lets the device register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningStatus {
    /// Registration allowed.
    Enabled,
    /// Registration refused.
    Disabled,
}

/// Checks a registration ID: 1 to 128 characters of lowercase ASCII
/// letters, digits, and hyphens.
pub fn validate_registration_id(registration_id: &str) -> Result<()> {
    if registration_id.is_empty() {
        return Err(ProvisioningError::Validation(
            "registration ID must not be empty".to_string(),
        ));
    }
    if registration_id.len() > MAX_REGISTRATION_ID_LEN {
        return Err(ProvisioningError::Validation(format!(
            "registration ID exceeds {MAX_REGISTRATION_ID_LEN} characters"
        )));
    }
    let valid = registration_id
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid {
        return Err(ProvisioningError::Validation(format!(
            "registration ID {registration_id:?} may only contain lowercase letters, digits and hyphens"
        )));
    }
    Ok(())
}

/// A device enrollment record.
///
/// Serialized field names are fixed by the service contract; optional
/// fields are omitted, never sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "EnrollmentPayload")]
pub struct IndividualEnrollment {
    registration_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,

    attestation: AttestationMechanism,

    #[serde(skip_serializing_if = "Option::is_none")]
    iot_hub_host_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    initial_twin_state: Option<TwinState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    provisioning_status: Option<ProvisioningStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    created_date_time_utc: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    last_updated_date_time_utc: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
}

/// Unvalidated shape of a service payload.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollmentPayload {
    registration_id: String,
    #[serde(default)]
    device_id: Option<String>,
    attestation: AttestationMechanism,
    #[serde(default)]
    iot_hub_host_name: Option<String>,
    #[serde(default)]
    initial_twin_state: Option<TwinState>,
    #[serde(default)]
    provisioning_status: Option<ProvisioningStatus>,
    #[serde(default)]
    created_date_time_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    last_updated_date_time_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    etag: Option<String>,
}

impl TryFrom<EnrollmentPayload> for IndividualEnrollment {
    type Error = ProvisioningError;

    fn try_from(payload: EnrollmentPayload) -> Result<Self> {
        let etag = payload
            .etag
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                ProvisioningError::Client(format!(
                    "service returned enrollment {:?} without an ETag",
                    payload.registration_id
                ))
            })?;
        validate_registration_id(&payload.registration_id)?;

        Ok(IndividualEnrollment {
            registration_id: payload.registration_id,
            device_id: payload.device_id,
            attestation: payload.attestation,
            iot_hub_host_name: payload.iot_hub_host_name,
            initial_twin_state: payload.initial_twin_state,
            provisioning_status: payload.provisioning_status,
            created_date_time_utc: payload.created_date_time_utc,
            last_updated_date_time_utc: payload.last_updated_date_time_utc,
            etag: Some(etag),
        })
    }
}

impl IndividualEnrollment {
    /// Creates a client-side enrollment.
    pub fn new(registration_id: impl Into<String>, attestation: AttestationMechanism) -> Result<Self> {
        let registration_id = registration_id.into();
        validate_registration_id(&registration_id)?;
        attestation.validate()?;

        Ok(IndividualEnrollment {
            registration_id,
            device_id: None,
            attestation,
            iot_hub_host_name: None,
            initial_twin_state: None,
            provisioning_status: None,
            created_date_time_utc: None,
            last_updated_date_time_utc: None,
            etag: None,
        })
    }

    /// Parses a service response body. Fails with
    /// [`ProvisioningError::Client`] when the ETag is missing.
    pub fn from_service_json(json: &str) -> Result<Self> {
        let payload: EnrollmentPayload = serde_json::from_str(json)?;
        Self::try_from(payload)
    }

    /// Like [`from_service_json`](Self::from_service_json) for a body the
    /// transport already parsed. A missing ETag is a
    /// [`ProvisioningError::Client`], never a parse error.
    pub fn from_service_value(value: serde_json::Value) -> Result<Self> {
        let payload: EnrollmentPayload = serde_json::from_value(value)?;
        Self::try_from(payload)
    }

    /// Device ID the hub assigns; defaults to the registration ID when unset.
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Result<Self> {
        let device_id = device_id.into();
        if device_id.trim().is_empty() {
            return Err(ProvisioningError::Validation(
                "device ID must not be empty".to_string(),
            ));
        }
        self.device_id = Some(device_id);
        Ok(self)
    }

    /// Hub the device is assigned to.
    #[must_use]
    pub fn with_iot_hub_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.iot_hub_host_name = Some(host_name.into());
        self
    }

    /// Twin applied at provisioning.
    #[must_use]
    pub fn with_initial_twin_state(mut self, twin: TwinState) -> Self {
        self.initial_twin_state = Some(twin);
        self
    }

    /// Enables or disables registration.
    #[must_use]
    pub fn with_provisioning_status(mut self, status: ProvisioningStatus) -> Self {
        self.provisioning_status = Some(status);
        self
    }

    /// Replaces the attestation, validating the new one.
    pub fn set_attestation(&mut self, attestation: AttestationMechanism) -> Result<()> {
        attestation.validate()?;
        self.attestation = attestation;
        Ok(())
    }

    /// Unique enrollment key.
    pub fn registration_id(&self) -> &str {
        &self.registration_id
    }

    /// Explicit device ID, if set.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// How the device proves its identity.
    pub fn attestation(&self) -> &AttestationMechanism {
        &self.attestation
    }

    /// Assigned hub, if any.
    pub fn iot_hub_host_name(&self) -> Option<&str> {
        self.iot_hub_host_name.as_deref()
    }

    /// Initial twin, if set.
    pub fn initial_twin_state(&self) -> Option<&TwinState> {
        self.initial_twin_state.as_ref()
    }

    /// Registration status, if set.
    pub fn provisioning_status(&self) -> Option<ProvisioningStatus> {
        self.provisioning_status
    }

    /// Set by the service on creation.
    pub fn created_date_time_utc(&self) -> Option<DateTime<Utc>> {
        self.created_date_time_utc
    }

    /// Set by the service on every write.
    pub fn last_updated_date_time_utc(&self) -> Option<DateTime<Utc>> {
        self.last_updated_date_time_utc
    }
}

impl ETagHolder for IndividualEnrollment {
    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = Some(etag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tpm() -> AttestationMechanism {
        AttestationMechanism::tpm("AToAAQALAAMAsgAgg3GXZ0SEs")
    }

    #[test]
    fn valid_registration_ids_construct() {
        let longest = "x".repeat(MAX_REGISTRATION_ID_LEN);
        for id in ["valid-id-123", "a", "0", "device-01-floor-3", longest.as_str()] {
            assert!(
                IndividualEnrollment::new(id, tpm()).is_ok(),
                "{id:?} should be accepted"
            );
        }
    }

    #[test]
    fn invalid_registration_ids_fail_validation() {
        let too_long = "x".repeat(129);
        for id in ["", "Upper", "under_score", "dot.ted", "spa ce", "ümlaut", too_long.as_str()] {
            let result = IndividualEnrollment::new(id, tpm());
            assert!(
                matches!(result, Err(ProvisioningError::Validation(_))),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_attestation_fails_validation() {
        let result = IndividualEnrollment::new("dev-1", AttestationMechanism::tpm(" "));
        assert!(matches!(result, Err(ProvisioningError::Validation(_))));
    }

    #[test]
    fn empty_device_id_is_rejected() {
        let result = IndividualEnrollment::new("dev-1", tpm())
            .unwrap()
            .with_device_id("");
        assert!(matches!(result, Err(ProvisioningError::Validation(_))));
    }

    #[test]
    fn client_side_enrollment_omits_absent_fields() {
        let enrollment = IndividualEnrollment::new("dev-1", tpm()).unwrap();
        let value = serde_json::to_value(&enrollment).unwrap();
        let fields = value.as_object().unwrap();
        assert_eq!(fields.len(), 2, "only registrationId and attestation: {value}");
        assert_eq!(value["registrationId"], "dev-1");
        assert_eq!(value["attestation"]["type"], "tpm");
        assert!(enrollment.etag().is_none());
    }

    #[test]
    fn serializes_all_fixed_field_names() {
        let enrollment = IndividualEnrollment::new("dev-1", tpm())
            .unwrap()
            .with_device_id("device-one")
            .unwrap()
            .with_iot_hub_host_name("hub.azure-devices.net")
            .with_initial_twin_state(TwinState::default())
            .with_provisioning_status(ProvisioningStatus::Disabled);
        let value = serde_json::to_value(&enrollment).unwrap();
        assert_eq!(value["deviceId"], "device-one");
        assert_eq!(value["iotHubHostName"], "hub.azure-devices.net");
        assert_eq!(value["initialTwinState"], json!({}));
        assert_eq!(value["provisioningStatus"], "disabled");
    }

    #[test]
    fn from_service_json_populates_server_fields() {
        let json = json!({
            "registrationId": "dev-1",
            "deviceId": "device-one",
            "attestation": {"type": "tpm", "tpm": {"endorsementKey": "ek", "storageRootKey": "srk"}},
            "iotHubHostName": "hub.azure-devices.net",
            "provisioningStatus": "enabled",
            "createdDateTimeUtc": "2024-03-01T08:15:00.123Z",
            "lastUpdatedDateTimeUtc": "2024-03-02T09:00:00Z",
            "etag": "\"1a00c6a1-0000-0100-0000-65e1a2b30000\""
        })
        .to_string();
        let enrollment = IndividualEnrollment::from_service_json(&json).unwrap();
        assert_eq!(enrollment.registration_id(), "dev-1");
        assert_eq!(enrollment.device_id(), Some("device-one"));
        assert_eq!(enrollment.provisioning_status(), Some(ProvisioningStatus::Enabled));
        assert!(enrollment.created_date_time_utc().is_some());
        assert!(enrollment.last_updated_date_time_utc().is_some());
        assert_eq!(
            enrollment.etag(),
            Some("\"1a00c6a1-0000-0100-0000-65e1a2b30000\"")
        );
    }

    #[test]
    fn from_service_json_without_etag_is_client_error() {
        let json = json!({
            "registrationId": "dev-1",
            "attestation": {"type": "symmetricKey", "symmetricKey": {}}
        })
        .to_string();
        let result = IndividualEnrollment::from_service_json(&json);
        assert!(
            matches!(result, Err(ProvisioningError::Client(_))),
            "got {result:?}"
        );
    }

    #[test]
    fn from_service_value_without_etag_is_client_error() {
        let value = json!({
            "registrationId": "dev-1",
            "attestation": {"type": "tpm", "tpm": {"endorsementKey": "ek"}}
        });
        let err = IndividualEnrollment::from_service_value(value).unwrap_err();
        assert!(matches!(err, ProvisioningError::Client(_)), "got {err:?}");
        assert!(!err.is_transport());
    }

    #[test]
    fn from_service_value_with_bad_shape_is_parse_error() {
        let err = IndividualEnrollment::from_service_value(json!({"etag": "\"v1\""})).unwrap_err();
        assert!(matches!(err, ProvisioningError::Parse(_)), "got {err:?}");
    }

    #[test]
    fn serde_deserialize_without_etag_fails() {
        let result: serde_json::Result<IndividualEnrollment> = serde_json::from_value(json!({
            "registrationId": "dev-1",
            "attestation": {"type": "tpm", "tpm": {"endorsementKey": "ek"}}
        }));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("ETag"), "unexpected error: {err}");
    }

    #[test]
    fn set_etag_enables_round_trip() {
        let mut enrollment = IndividualEnrollment::new("dev-1", tpm()).unwrap();
        enrollment.set_etag("\"v1\"".to_string());
        let json = serde_json::to_string(&enrollment).unwrap();
        let restored = IndividualEnrollment::from_service_json(&json).unwrap();
        assert_eq!(restored, enrollment);
    }

    #[test]
    fn set_attestation_validates() {
        let mut enrollment = IndividualEnrollment::new("dev-1", tpm()).unwrap();
        assert!(enrollment.set_attestation(AttestationMechanism::tpm("")).is_err());
        enrollment
            .set_attestation(AttestationMechanism::x509_ca_reference("root-ca"))
            .unwrap();
        assert_eq!(
            enrollment.attestation().kind(),
            crate::attestation::AttestationKind::X509
        );
    }
}
