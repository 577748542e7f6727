//! Attestation mechanisms: how a device proves its identity.
//!
//! On the wire an attestation is an object whose `type` field names the
//! variant and whose same-named field holds the variant's data:
//!
//! ```json
//! {"type": "tpm", "tpm": {"endorsementKey": "AToAAQAL..."}}
//! {"type": "x509", "x509": {"clientCertificates": {"primary": {"certificate": "MIIB..."}}}}
//! {"type": "symmetricKey", "symmetricKey": {"primaryKey": "..."}}
//! ```
//!
//! [`AttestationMechanism`] is the closed Rust form. Conversion to and from
//! the wire struct is exhaustive; a `type` whose payload is missing fails
//! deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProvisioningError, Result};

// ── Variant payloads ───────────────────────────────────────────────────

/// TPM attestation. Only the endorsement key is required; the service fills
/// in the storage root key after first registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TpmAttestation {
    /// Endorsement key, base64.
    pub endorsement_key: String,

    /// Storage root key, base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_root_key: Option<String>,
}

/// X509 attestation by client certificate, signing certificate, or CA
/// reference. At least one of the three must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X509Attestation {
    /// Leaf certificates presented by the device itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificates: Option<X509Certificates>,

    /// Intermediate certificates that signed the device certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_certificates: Option<X509Certificates>,

    /// CA certificates registered with the service, by name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_references: Option<X509CaReferences>,
}

/// Primary and optional secondary certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X509Certificates {
    /// Primary certificate.
    pub primary: X509CertificateWithInfo,

    /// Secondary certificate, used during rollover.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<X509CertificateWithInfo>,
}

/// A certificate as sent (base64 or PEM body) or as returned (parsed info
/// only; the service never echoes the certificate itself).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X509CertificateWithInfo {
    /// Certificate body. Set on requests only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,

    /// Parsed details. Set on responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<X509CertificateInfo>,
}

/// Service-parsed certificate details.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X509CertificateInfo {
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub sha1_thumbprint: String,
    #[serde(default)]
    pub sha256_thumbprint: String,
    #[serde(default)]
    pub issuer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub version: i32,
}

/// Names of CA certificates registered with the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X509CaReferences {
    /// Name of the primary CA certificate.
    pub primary: String,

    /// Name of the secondary CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

/// Symmetric key attestation. Keys left out are generated by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymmetricKeyAttestation {
    /// Primary key, base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    /// Secondary key, base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_key: Option<String>,
}

// ── Tagged union ───────────────────────────────────────────────────────

/// Wire discriminator of an attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttestationKind {
    /// `"tpm"`
    Tpm,
    /// `"x509"`
    X509,
    /// `"symmetricKey"`
    SymmetricKey,
}

/// How a device authenticates to the provisioning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AttestationWire", into = "AttestationWire")]
pub enum AttestationMechanism {
    /// Trusted Platform Module endorsement key.
    Tpm(TpmAttestation),
    /// X509 certificates.
    X509(X509Attestation),
    /// Shared symmetric keys.
    SymmetricKey(SymmetricKeyAttestation),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestationWire {
    #[serde(rename = "type")]
    kind: AttestationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tpm: Option<TpmAttestation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x509: Option<X509Attestation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    symmetric_key: Option<SymmetricKeyAttestation>,
}

impl TryFrom<AttestationWire> for AttestationMechanism {
    type Error = String;

    fn try_from(wire: AttestationWire) -> std::result::Result<Self, Self::Error> {
        let mechanism = match wire.kind {
            AttestationKind::Tpm => wire.tpm.map(Self::Tpm),
            AttestationKind::X509 => wire.x509.map(Self::X509),
            AttestationKind::SymmetricKey => wire.symmetric_key.map(Self::SymmetricKey),
        };
        mechanism.ok_or_else(|| format!("attestation of type {:?} has no payload", wire.kind))
    }
}

impl From<AttestationMechanism> for AttestationWire {
    fn from(mechanism: AttestationMechanism) -> Self {
        let kind = mechanism.kind();
        let mut wire = AttestationWire {
            kind,
            tpm: None,
            x509: None,
            symmetric_key: None,
        };
        match mechanism {
            AttestationMechanism::Tpm(tpm) => wire.tpm = Some(tpm),
            AttestationMechanism::X509(x509) => wire.x509 = Some(x509),
            AttestationMechanism::SymmetricKey(key) => wire.symmetric_key = Some(key),
        }
        wire
    }
}

impl AttestationMechanism {
    /// TPM attestation from a base64 endorsement key.
    pub fn tpm(endorsement_key: impl Into<String>) -> Self {
        Self::Tpm(TpmAttestation {
            endorsement_key: endorsement_key.into(),
            storage_root_key: None,
        })
    }

    /// X509 attestation pinned to one client certificate.
    pub fn x509_client_certificate(certificate: impl Into<String>) -> Self {
        Self::X509(X509Attestation {
            client_certificates: Some(X509Certificates::primary(certificate)),
            ..X509Attestation::default()
        })
    }

    /// X509 attestation by intermediate signing certificate.
    pub fn x509_signing_certificate(certificate: impl Into<String>) -> Self {
        Self::X509(X509Attestation {
            signing_certificates: Some(X509Certificates::primary(certificate)),
            ..X509Attestation::default()
        })
    }

    /// X509 attestation by a CA certificate already registered with the
    /// service.
    pub fn x509_ca_reference(primary: impl Into<String>) -> Self {
        Self::X509(X509Attestation {
            ca_references: Some(X509CaReferences {
                primary: primary.into(),
                secondary: None,
            }),
            ..X509Attestation::default()
        })
    }

    /// Symmetric key attestation. Pass `None` to let the service generate
    /// the keys.
    pub fn symmetric_key(primary: Option<String>, secondary: Option<String>) -> Self {
        Self::SymmetricKey(SymmetricKeyAttestation {
            primary_key: primary,
            secondary_key: secondary,
        })
    }

    /// The wire discriminator of this mechanism.
    pub fn kind(&self) -> AttestationKind {
        match self {
            Self::Tpm(_) => AttestationKind::Tpm,
            Self::X509(_) => AttestationKind::X509,
            Self::SymmetricKey(_) => AttestationKind::SymmetricKey,
        }
    }

    /// Rejects attestations that carry no identity material.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Tpm(tpm) if tpm.endorsement_key.trim().is_empty() => Err(
                ProvisioningError::Validation("TPM endorsement key must not be empty".to_string()),
            ),
            Self::X509(x509)
                if x509.client_certificates.is_none()
                    && x509.signing_certificates.is_none()
                    && x509.ca_references.is_none() =>
            {
                Err(ProvisioningError::Validation(
                    "X509 attestation needs a client certificate, signing certificate or CA reference"
                        .to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

impl X509Certificates {
    fn primary(certificate: impl Into<String>) -> Self {
        X509Certificates {
            primary: X509CertificateWithInfo {
                certificate: Some(certificate.into()),
                info: None,
            },
            secondary: None,
        }
    }
}
