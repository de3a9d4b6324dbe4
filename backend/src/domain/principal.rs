//! Principal identity model.
//!
//! A principal is the identity an access decision is made for: a registered
//! user with a login and password digest, or an identity synthesised from a
//! voucher code so the NAS can re-authenticate the device with the code as
//! username. The identity store owns these records; this core only reads
//! them, except for voucher-driven principal creation.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::voucher::VoucherCode;

/// Stable principal identifier stored as a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validation errors raised by principal value objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrincipalValidationError {
    /// Login identifier is empty after trimming.
    #[error("login identifier must not be empty")]
    EmptyLogin,
    /// Password digest is not a 64-character hex string.
    #[error("password digest must be a hex-encoded SHA-256 value")]
    MalformedDigest,
}

/// Login identifier: an email address or a synthesised voucher login.
///
/// Stored lowercased so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LoginIdentifier(String);

impl LoginIdentifier {
    /// Validate and normalise a login identifier.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, PrincipalValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(PrincipalValidationError::EmptyLogin);
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    /// Borrow the normalised identifier.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for LoginIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for LoginIdentifier {
    type Error = PrincipalValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LoginIdentifier> for String {
    fn from(value: LoginIdentifier) -> Self {
        value.0
    }
}

/// Hex-encoded SHA-256 digest of a principal's secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    const HEX_LEN: usize = 64;

    /// Wrap an existing hex digest, validating its shape.
    pub fn from_hex(raw: impl Into<String>) -> Result<Self, PrincipalValidationError> {
        let raw = raw.into();
        if raw.len() != Self::HEX_LEN || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PrincipalValidationError::MalformedDigest);
        }
        Ok(Self(raw.to_lowercase()))
    }

    /// Digest a plaintext secret.
    pub fn digest(secret: &str) -> Self {
        Self(hex::encode(Sha256::digest(secret.as_bytes())))
    }

    /// Verify a plaintext secret against this digest.
    pub fn verify(&self, secret: &str) -> bool {
        // Both sides are fixed-length hex, so a simple comparison suffices.
        Self::digest(secret).0 == self.0
    }

    /// Borrow the hex encoding for persistence.
    pub fn as_hex(&self) -> &str {
        self.0.as_str()
    }
}

/// Identity a decision is made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Unique identifier.
    pub id: PrincipalId,
    /// Login identifier (email or synthesised).
    pub login: LoginIdentifier,
    /// Whether the account may be granted access at all.
    pub active: bool,
    /// Digest of the account secret; absent for voucher-derived principals.
    pub password_digest: Option<PasswordDigest>,
}

impl Principal {
    /// Synthesise a principal from a voucher code so the device can
    /// re-authenticate with the code as username.
    pub fn derived_from_voucher(code: &VoucherCode) -> Result<Self, PrincipalValidationError> {
        Ok(Self {
            id: PrincipalId::random(),
            login: LoginIdentifier::new(code.as_str())?,
            active: true,
            password_digest: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Alice@Example.COM", "alice@example.com")]
    #[case("  bob@example.com  ", "bob@example.com")]
    #[case("CODE-000042", "code-000042")]
    fn login_identifier_normalises_case_and_whitespace(
        #[case] raw: &str,
        #[case] expected: &str,
    ) {
        let login = LoginIdentifier::new(raw).expect("valid login");
        assert_eq!(login.as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn login_identifier_rejects_blank(#[case] raw: &str) {
        let err = LoginIdentifier::new(raw).expect_err("blank login rejected");
        assert_eq!(err, PrincipalValidationError::EmptyLogin);
    }

    #[rstest]
    fn password_digest_round_trips() {
        let digest = PasswordDigest::digest("hunter2");
        assert!(digest.verify("hunter2"));
        assert!(!digest.verify("hunter3"));

        let restored = PasswordDigest::from_hex(digest.as_hex()).expect("valid hex");
        assert!(restored.verify("hunter2"));
    }

    #[rstest]
    #[case("abc")]
    #[case("zz00zz00zz00zz00zz00zz00zz00zz00zz00zz00zz00zz00zz00zz00zz00zz00")]
    fn password_digest_rejects_malformed_hex(#[case] raw: &str) {
        let err = PasswordDigest::from_hex(raw).expect_err("malformed digest rejected");
        assert_eq!(err, PrincipalValidationError::MalformedDigest);
    }

    #[rstest]
    fn voucher_derived_principal_uses_code_as_login() {
        let code = VoucherCode::new("code-000042").expect("valid code");
        let principal = Principal::derived_from_voucher(&code).expect("valid principal");

        assert!(principal.active);
        assert!(principal.password_digest.is_none());
        assert_eq!(principal.login.as_str(), "code-000042");
    }
}
