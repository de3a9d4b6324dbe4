//! Authorization requests and decisions.
//!
//! The decision envelope is the contract with the NAS integration: a grant
//! carries the session token and effective limits, a denial carries only the
//! uniform external message. The specific denial reason stays internal and
//! is surfaced through logs alone, so probing requests learn nothing about
//! which credential detail failed.

use chrono::{DateTime, Utc};

use super::entitlement::Entitlement;
use super::principal::{Principal, PrincipalId};
use super::session::{AccessSession, DeviceId};
use super::voucher::Voucher;

/// External message returned for every denial, regardless of reason.
pub const DENIAL_MESSAGE: &str = "Access denied";

/// Credential material and NAS context for one authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    /// Raw identifier as typed: a login email or a voucher code.
    pub identifier: String,
    /// Secret presented alongside the identifier, if any.
    pub secret: Option<String>,
    /// Device the grant would apply to.
    pub device: DeviceId,
    /// NAS identifier, kept for audit logging.
    pub nas_id: Option<String>,
    /// NAS source address, kept for audit logging.
    pub nas_ip: Option<String>,
    /// Calling-station identifier as reported by the NAS.
    pub calling_station_id: Option<String>,
}

impl AccessRequest {
    /// Rate-limit key covering the identifier and device pair.
    pub fn throttle_key(&self) -> String {
        format!("{}|{}", self.identifier.trim().to_lowercase(), self.device)
    }
}

/// Internal denial reasons. Never serialised to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Identifier matched neither a login nor a voucher code.
    UnknownCredential,
    /// Principal exists but the presented secret did not verify.
    InvalidSecret,
    /// Principal account is deactivated.
    AccountInactive,
    /// No subscription or voucher grants access.
    NoEntitlement,
    /// Voucher was consumed by a different principal.
    VoucherAlreadyUsed,
    /// Another request consumed the voucher concurrently.
    VoucherRaceLost,
    /// Voucher validity window elapsed.
    VoucherExpired,
    /// Too many attempts from this identifier and device.
    RateLimited,
}

impl DenyReason {
    /// Stable label used in structured log events.
    pub fn log_label(&self) -> &'static str {
        match self {
            Self::UnknownCredential => "unknown_credential",
            Self::InvalidSecret => "invalid_secret",
            Self::AccountInactive => "account_inactive",
            Self::NoEntitlement => "no_entitlement",
            Self::VoucherAlreadyUsed => "voucher_already_used",
            Self::VoucherRaceLost => "voucher_race_lost",
            Self::VoucherExpired => "voucher_expired",
            Self::RateLimited => "rate_limited",
        }
    }
}

/// Granted access with the session and effective limits attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    /// Principal the grant was issued to.
    pub principal: Principal,
    /// Effective session limits.
    pub entitlement: Entitlement,
    /// Ledger entry backing the grant.
    pub session: AccessSession,
}

/// Outcome of one authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access granted.
    Grant(Box<AccessGrant>),
    /// Access denied for an internal reason.
    Deny(DenyReason),
}

impl AccessDecision {
    /// Whether the decision is a grant.
    pub fn is_grant(&self) -> bool {
        matches!(self, Self::Grant(_))
    }
}

/// Request to consume a voucher outside the authorization flow, e.g. from
/// the portal's redemption page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionRequest {
    /// Redemption code as typed.
    pub code: String,
    /// Principal redeeming the voucher. When absent a principal is
    /// synthesised from the code so the device can re-authenticate with it.
    pub principal: Option<PrincipalId>,
    /// Instant of the attempt.
    pub requested_at: DateTime<Utc>,
}

/// Successful redemption result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionReceipt {
    /// Voucher after the state transition.
    pub voucher: Voucher,
    /// Principal the voucher was bound to.
    pub principal: PrincipalId,
}
