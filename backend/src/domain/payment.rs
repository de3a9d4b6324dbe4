//! Payment settlement record.
//!
//! Payments are created by the purchase flow in `Pending` state with the
//! provider's transaction identifier stored verbatim. The reconciliation
//! worker is the exclusive writer of the terminal transition
//! `Pending → Completed | Failed`; terminal states never revert.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::principal::PrincipalId;
use super::voucher::VoucherId;

/// Stable payment identifier stored as a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
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

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Mobile-money scheme that collected the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// MTN Mobile Money collections.
    MtnMomo,
    /// Airtel Money collections.
    AirtelMoney,
}

impl PaymentMethod {
    /// Storage label for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MtnMomo => "MTN_MOMO",
            Self::AirtelMoney => "AIRTEL_MONEY",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MTN_MOMO" => Ok(Self::MtnMomo),
            "AIRTEL_MONEY" => Ok(Self::AirtelMoney),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Awaiting provider settlement.
    Pending,
    /// Settled successfully. Terminal.
    Completed,
    /// Rejected by the provider. Terminal.
    Failed,
}

impl PaymentStatus {
    /// Storage label for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Whether the status is terminal and must never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement record bridging the purchase flow and the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    /// Unique identifier.
    pub id: PaymentId,
    /// Principal that initiated the purchase.
    pub principal: PrincipalId,
    /// Voucher activated by this payment, if any.
    pub voucher: Option<VoucherId>,
    /// Amount in minor currency units.
    pub amount_minor: i64,
    /// ISO currency code.
    pub currency: String,
    /// Collecting scheme.
    pub method: PaymentMethod,
    /// Lifecycle state.
    pub status: PaymentStatus,
    /// Provider transaction identifier, stored verbatim for correlation.
    pub transaction_id: String,
    /// Settlement instant; set when `status` becomes `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
}
