//! Voucher aggregate and its lifecycle.
//!
//! A voucher is a prepaid, single-use entitlement identified by a redeemable
//! code. Lifecycle: `Active → Used` (terminal), `Active → Expired` (terminal,
//! lazily applied once `valid_until` has passed) and an administrative-only
//! `→ Cancelled`. The redemption transition must be exactly-once; repositories
//! implement it as a single conditional write and this module only describes
//! the preconditions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entitlement::EntitlementLimits;
use super::principal::PrincipalId;

/// Stable voucher identifier stored as a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoucherId(Uuid);

impl VoucherId {
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

impl fmt::Display for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validation errors raised by voucher value objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoucherValidationError {
    /// Code is empty after trimming.
    #[error("voucher code must not be empty")]
    EmptyCode,
    /// Code contains characters outside `A-Z`, `0-9` and `-`.
    #[error("voucher code may only contain letters, digits, or dashes")]
    InvalidCodeCharacters,
    /// Unknown status label read from storage.
    #[error("unknown voucher status: {0}")]
    UnknownStatus(String),
    /// `used_by` must be set exactly when the status is `Used`.
    #[error("voucher used_by must be set iff status is USED")]
    UsedByMismatch,
}

/// Redemption code: uppercase alphanumeric (dashes allowed), unique per
/// voucher. Input is case-normalised so codes typed in lowercase match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoucherCode(String);

impl VoucherCode {
    /// Validate and normalise a redemption code.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, VoucherValidationError> {
        let normalised = raw.as_ref().trim().to_uppercase();
        if normalised.is_empty() {
            return Err(VoucherValidationError::EmptyCode);
        }
        if !normalised
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(VoucherValidationError::InvalidCodeCharacters);
        }
        Ok(Self(normalised))
    }

    /// Borrow the normalised code.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for VoucherCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for VoucherCode {
    type Error = VoucherValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VoucherCode> for String {
    fn from(value: VoucherCode) -> Self {
        value.0
    }
}

/// Voucher lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherStatus {
    /// Redeemable, subject to validity window.
    Active,
    /// Consumed by exactly one principal. Terminal.
    Used,
    /// Validity window elapsed before redemption. Terminal.
    Expired,
    /// Withdrawn administratively. Terminal.
    Cancelled,
}

impl VoucherStatus {
    /// Storage label for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Used => "USED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for VoucherStatus {
    type Err = VoucherValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "USED" => Ok(Self::Used),
            "EXPIRED" => Ok(Self::Expired),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(VoucherValidationError::UnknownStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prepaid entitlement unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voucher {
    /// Unique identifier.
    pub id: VoucherId,
    /// Unique redemption code.
    pub code: VoucherCode,
    /// Principal that issued (owns) the voucher batch.
    pub issuer: PrincipalId,
    /// Sale price in minor currency units.
    pub price_minor: i64,
    /// Session limits granted on redemption.
    pub limits: EntitlementLimits,
    /// Earliest instant the voucher may be redeemed, if bounded.
    pub valid_from: Option<DateTime<Utc>>,
    /// Latest instant the voucher may be redeemed, if bounded.
    pub valid_until: Option<DateTime<Utc>>,
    /// Lifecycle state.
    pub status: VoucherStatus,
    /// Principal that consumed the voucher; set iff `status` is `Used`.
    pub used_by: Option<PrincipalId>,
    /// Instant of consumption; set together with `used_by`.
    pub used_at: Option<DateTime<Utc>>,
}

impl Voucher {
    /// Check the `used_by`/`status` invariant, typically after reading a row
    /// from storage.
    pub fn validate(&self) -> Result<(), VoucherValidationError> {
        let used = self.status == VoucherStatus::Used;
        if used != self.used_by.is_some() {
            return Err(VoucherValidationError::UsedByMismatch);
        }
        Ok(())
    }

    /// Whether `valid_until` has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until <= now)
    }

    /// Whether `valid_from` is still in the future.
    pub fn is_not_yet_valid(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.is_some_and(|from| from > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn voucher(status: VoucherStatus, used_by: Option<PrincipalId>) -> Voucher {
        Voucher {
            id: VoucherId::random(),
            code: VoucherCode::new("CODE-1").expect("valid code"),
            issuer: PrincipalId::random(),
            price_minor: 5_000,
            limits: EntitlementLimits::default(),
            valid_from: None,
            valid_until: None,
            status,
            used_by,
            used_at: None,
        }
    }

    #[rstest]
    #[case("code-000042", "CODE-000042")]
    #[case("  ab12  ", "AB12")]
    fn code_normalises_to_uppercase(#[case] raw: &str, #[case] expected: &str) {
        let code = VoucherCode::new(raw).expect("valid code");
        assert_eq!(code.as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("with space")]
    #[case("bad_underscore")]
    fn code_rejects_invalid_input(#[case] raw: &str) {
        VoucherCode::new(raw).expect_err("invalid code rejected");
    }

    #[rstest]
    #[case(VoucherStatus::Active, "ACTIVE")]
    #[case(VoucherStatus::Used, "USED")]
    #[case(VoucherStatus::Expired, "EXPIRED")]
    #[case(VoucherStatus::Cancelled, "CANCELLED")]
    fn status_labels_round_trip(#[case] status: VoucherStatus, #[case] label: &str) {
        assert_eq!(status.as_str(), label);
        assert_eq!(label.parse::<VoucherStatus>().expect("parse"), status);
    }

    #[rstest]
    fn validate_enforces_used_by_invariant() {
        assert!(voucher(VoucherStatus::Active, None).validate().is_ok());
        assert!(
            voucher(VoucherStatus::Used, Some(PrincipalId::random()))
                .validate()
                .is_ok()
        );
        assert_eq!(
            voucher(VoucherStatus::Used, None).validate(),
            Err(VoucherValidationError::UsedByMismatch)
        );
        assert_eq!(
            voucher(VoucherStatus::Active, Some(PrincipalId::random())).validate(),
            Err(VoucherValidationError::UsedByMismatch)
        );
    }

    #[rstest]
    fn expiry_checks_use_valid_until_boundary() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("ts");
        let mut v = voucher(VoucherStatus::Active, None);

        assert!(!v.is_expired(now));

        v.valid_until = Some(now);
        assert!(v.is_expired(now), "boundary counts as expired");

        v.valid_until = Some(now + chrono::Duration::seconds(1));
        assert!(!v.is_expired(now));

        v.valid_from = Some(now + chrono::Duration::hours(1));
        assert!(v.is_not_yet_valid(now));
    }
}
