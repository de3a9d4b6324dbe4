//! Entitlement evaluation.
//!
//! Merges the two independently-expiring entitlement sources, the current
//! subscription and an attached voucher, into one immutable set of session
//! limits. Voucher values override subscription values field-by-field; unset
//! voucher fields fall back to subscription fields; hard defaults apply when
//! neither source sets a field.
//!
//! Unit conversions are exact and happen only here:
//! hours→seconds ×3600, Mbps→bytes/sec ×125 000, GiB→bytes ×1 073 741 824.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::principal::Principal;
use super::subscription::Subscription;
use super::voucher::{Voucher, VoucherId, VoucherStatus};

/// Seconds granted when no source sets a time limit (1 hour).
pub const DEFAULT_SESSION_SECONDS: u64 = 3_600;
/// Bytes/sec granted when no source sets a speed limit (512 kbps).
pub const DEFAULT_RATE_BPS: u64 = 64_000;
/// Bytes granted when no source sets a data cap (1 GiB).
pub const DEFAULT_DATA_CAP_BYTES: u64 = 1_073_741_824;

const SECONDS_PER_HOUR: u64 = 3_600;
const BYTES_PER_SEC_PER_MBPS: u64 = 125_000;
const BYTES_PER_GIB: u64 = 1_073_741_824;

/// Optional session limits as administered on vouchers and subscriptions.
///
/// Units are the administrative ones: hours, Mbps, GiB. Conversion to wire
/// units happens when an [`Entitlement`] is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementLimits {
    /// Session duration in hours.
    pub time_limit_hours: Option<u32>,
    /// Symmetric throughput ceiling in Mbps.
    pub speed_limit_mbps: Option<u32>,
    /// Data cap in GiB.
    pub data_limit_gib: Option<u32>,
}

impl EntitlementLimits {
    /// Merge two optional sources, `primary` winning field-by-field.
    fn merged(primary: Option<Self>, fallback: Option<Self>) -> Self {
        let primary = primary.unwrap_or_default();
        let fallback = fallback.unwrap_or_default();
        Self {
            time_limit_hours: primary.time_limit_hours.or(fallback.time_limit_hours),
            speed_limit_mbps: primary.speed_limit_mbps.or(fallback.speed_limit_mbps),
            data_limit_gib: primary.data_limit_gib.or(fallback.data_limit_gib),
        }
    }
}

/// Immutable evaluation output: the effective limits for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    /// Granted session duration in seconds.
    pub session_seconds: u64,
    /// Download ceiling in bytes/sec.
    pub down_bps: u64,
    /// Upload ceiling in bytes/sec.
    pub up_bps: u64,
    /// Data cap in bytes.
    pub data_cap_bytes: u64,
    /// Voucher that contributed the entitlement and may need consuming.
    pub source_voucher: Option<VoucherId>,
}

/// Reasons evaluation denies access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    /// The principal's account is inactive.
    #[error("principal account is inactive")]
    AccountInactive,
    /// Neither a current subscription nor a usable voucher applies.
    #[error("no usable subscription or voucher")]
    NoEntitlement,
    /// The attached voucher's validity window has elapsed.
    #[error("voucher validity window has elapsed")]
    VoucherExpired,
    /// The attached voucher was consumed by a different principal.
    #[error("voucher already consumed by another principal")]
    VoucherAlreadyUsed,
}

/// Select the voucher's limits when it is usable by `principal` at `now`.
///
/// A voucher already `Used` by the same principal still entitles, which is
/// what lets a device re-authorize with the same code, but contributes no
/// second redemption.
fn usable_voucher_limits(
    voucher: &Voucher,
    principal: &Principal,
    now: DateTime<Utc>,
) -> Result<Option<EntitlementLimits>, EvaluationError> {
    match voucher.status {
        VoucherStatus::Expired => Err(EvaluationError::VoucherExpired),
        VoucherStatus::Cancelled => Ok(None),
        VoucherStatus::Used => {
            if voucher.used_by.as_ref() == Some(&principal.id) {
                Ok(Some(voucher.limits))
            } else {
                Err(EvaluationError::VoucherAlreadyUsed)
            }
        }
        VoucherStatus::Active => {
            if voucher.is_expired(now) {
                Err(EvaluationError::VoucherExpired)
            } else if voucher.is_not_yet_valid(now) {
                Ok(None)
            } else {
                Ok(Some(voucher.limits))
            }
        }
    }
}

/// Compute the effective entitlement for a principal.
///
/// `voucher` is the credential-attached voucher, if any; `subscription` is
/// the principal's most recently started subscription, if any. Precedence:
/// voucher fields win over subscription fields, then hard defaults.
pub fn evaluate(
    principal: &Principal,
    voucher: Option<&Voucher>,
    subscription: Option<&Subscription>,
    now: DateTime<Utc>,
) -> Result<Entitlement, EvaluationError> {
    if !principal.active {
        return Err(EvaluationError::AccountInactive);
    }

    let voucher_limits = match voucher {
        Some(v) => usable_voucher_limits(v, principal, now)?,
        None => None,
    };
    let subscription_limits = subscription
        .filter(|s| s.is_current(now))
        .map(|s| s.limits);

    if voucher_limits.is_none() && subscription_limits.is_none() {
        return Err(EvaluationError::NoEntitlement);
    }

    let merged = EntitlementLimits::merged(voucher_limits, subscription_limits);
    let rate_bps = merged
        .speed_limit_mbps
        .map_or(DEFAULT_RATE_BPS, |mbps| u64::from(mbps) * BYTES_PER_SEC_PER_MBPS);

    Ok(Entitlement {
        session_seconds: merged
            .time_limit_hours
            .map_or(DEFAULT_SESSION_SECONDS, |h| u64::from(h) * SECONDS_PER_HOUR),
        down_bps: rate_bps,
        up_bps: rate_bps,
        data_cap_bytes: merged
            .data_limit_gib
            .map_or(DEFAULT_DATA_CAP_BYTES, |gib| u64::from(gib) * BYTES_PER_GIB),
        source_voucher: voucher_limits
            .is_some()
            .then(|| voucher.map(|v| v.id.clone()))
            .flatten(),
    })
}
