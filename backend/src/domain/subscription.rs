//! Subscription aggregate.
//!
//! A recurring entitlement owned by a principal. Subscriptions are created
//! and managed by administrative collaborators; this core only reads them.
//! A principal may hold several; only the most recently started `active`
//! subscription whose `end_date` has not passed is authoritative.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entitlement::EntitlementLimits;
use super::principal::PrincipalId;

/// Stable subscription identifier stored as a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
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

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Subscription lifecycle states. Stored lowercased, matching the billing
/// collaborator's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Billable and grants entitlement while current.
    Active,
    /// Suspended; grants nothing.
    Inactive,
    /// Terminated; grants nothing.
    Cancelled,
}

impl SubscriptionStatus {
    /// Storage label for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown subscription status: {other}")),
        }
    }
}

/// Recurring entitlement record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Unique identifier.
    pub id: SubscriptionId,
    /// Owning principal.
    pub principal: PrincipalId,
    /// Lifecycle state.
    pub status: SubscriptionStatus,
    /// Session limits granted while current.
    pub limits: EntitlementLimits,
    /// Start of the billing period.
    pub start_date: DateTime<Utc>,
    /// End of the billing period, if bounded.
    pub end_date: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Whether this subscription grants entitlement at `now`.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.end_date.is_none_or(|end| end > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn subscription(status: SubscriptionStatus, end_date: Option<DateTime<Utc>>) -> Subscription {
        Subscription {
            id: SubscriptionId::random(),
            principal: PrincipalId::random(),
            status,
            limits: EntitlementLimits::default(),
            start_date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("ts"),
            end_date,
        }
    }

    #[rstest]
    fn active_open_ended_subscription_is_current() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).single().expect("ts");
        assert!(subscription(SubscriptionStatus::Active, None).is_current(now));
    }

    #[rstest]
    #[case(SubscriptionStatus::Inactive)]
    #[case(SubscriptionStatus::Cancelled)]
    fn non_active_subscription_is_never_current(#[case] status: SubscriptionStatus) {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).single().expect("ts");
        assert!(!subscription(status, None).is_current(now));
    }

    #[rstest]
    fn elapsed_end_date_makes_subscription_stale() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).single().expect("ts");
        let ended = subscription(SubscriptionStatus::Active, Some(now));
        assert!(!ended.is_current(now), "end boundary no longer grants");

        let running = subscription(
            SubscriptionStatus::Active,
            Some(now + chrono::Duration::days(1)),
        );
        assert!(running.is_current(now));
    }
}
