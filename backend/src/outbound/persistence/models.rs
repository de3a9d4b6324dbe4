//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. They exist solely to satisfy Diesel's
//! type requirements and to decode rows into validated domain types.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::entitlement::EntitlementLimits;
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ports::RepositoryError;
use crate::domain::principal::{LoginIdentifier, PasswordDigest, Principal, PrincipalId};
use crate::domain::session::{AccessSession, DeviceId, SessionToken};
use crate::domain::subscription::{Subscription, SubscriptionId};
use crate::domain::voucher::{Voucher, VoucherCode, VoucherId};

use super::schema::{access_sessions, payments, principals, subscriptions, vouchers};

fn decode_limit(value: Option<i32>, field: &str) -> Result<Option<u32>, RepositoryError> {
    value
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| RepositoryError::query(format!("negative {field} in storage")))
        })
        .transpose()
}

/// Row struct for reading from the principals table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = principals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PrincipalRow {
    pub id: Uuid,
    pub login: String,
    pub active: bool,
    pub password_digest: Option<String>,
    #[expect(dead_code, reason = "schema field kept for audit queries")]
    pub created_at: DateTime<Utc>,
    #[expect(dead_code, reason = "schema field kept for audit queries")]
    pub updated_at: DateTime<Utc>,
}

impl PrincipalRow {
    pub(crate) fn into_domain(self) -> Result<Principal, RepositoryError> {
        let login = LoginIdentifier::new(&self.login)
            .map_err(|err| RepositoryError::query(err.to_string()))?;
        let password_digest = self
            .password_digest
            .map(PasswordDigest::from_hex)
            .transpose()
            .map_err(|err| RepositoryError::query(err.to_string()))?;
        Ok(Principal {
            id: PrincipalId::from_uuid(self.id),
            login,
            active: self.active,
            password_digest,
        })
    }
}

/// Insertable struct for creating synthesised principals.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = principals)]
pub(crate) struct NewPrincipalRow<'a> {
    pub id: Uuid,
    pub login: &'a str,
    pub active: bool,
    pub password_digest: Option<&'a str>,
}

/// Row struct for reading from the vouchers table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = vouchers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct VoucherRow {
    pub id: Uuid,
    pub code: String,
    pub issuer_id: Uuid,
    pub price_minor: i64,
    pub time_limit_hours: Option<i32>,
    pub speed_limit_mbps: Option<i32>,
    pub data_limit_gib: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub status: String,
    pub used_by: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
}

impl VoucherRow {
    pub(crate) fn into_domain(self) -> Result<Voucher, RepositoryError> {
        let code = VoucherCode::new(&self.code)
            .map_err(|err| RepositoryError::query(err.to_string()))?;
        let status = self
            .status
            .parse()
            .map_err(|err: crate::domain::voucher::VoucherValidationError| {
                RepositoryError::query(err.to_string())
            })?;
        let voucher = Voucher {
            id: VoucherId::from_uuid(self.id),
            code,
            issuer: PrincipalId::from_uuid(self.issuer_id),
            price_minor: self.price_minor,
            limits: EntitlementLimits {
                time_limit_hours: decode_limit(self.time_limit_hours, "time limit")?,
                speed_limit_mbps: decode_limit(self.speed_limit_mbps, "speed limit")?,
                data_limit_gib: decode_limit(self.data_limit_gib, "data limit")?,
            },
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            status,
            used_by: self.used_by.map(PrincipalId::from_uuid),
            used_at: self.used_at,
        };
        voucher
            .validate()
            .map_err(|err| RepositoryError::query(err.to_string()))?;
        Ok(voucher)
    }
}

/// Row struct for reading from the subscriptions table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SubscriptionRow {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub status: String,
    pub time_limit_hours: Option<i32>,
    pub speed_limit_mbps: Option<i32>,
    pub data_limit_gib: Option<i32>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl SubscriptionRow {
    pub(crate) fn into_domain(self) -> Result<Subscription, RepositoryError> {
        let status = self
            .status
            .parse()
            .map_err(|err: String| RepositoryError::query(err))?;
        Ok(Subscription {
            id: SubscriptionId::from_uuid(self.id),
            principal: PrincipalId::from_uuid(self.principal_id),
            status,
            limits: EntitlementLimits {
                time_limit_hours: decode_limit(self.time_limit_hours, "time limit")?,
                speed_limit_mbps: decode_limit(self.speed_limit_mbps, "speed limit")?,
                data_limit_gib: decode_limit(self.data_limit_gib, "data limit")?,
            },
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}

/// Row struct for reading from the payments table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PaymentRow {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub voucher_id: Option<Uuid>,
    pub amount_minor: i64,
    pub currency: String,
    pub method: String,
    pub status: String,
    pub transaction_id: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PaymentRow {
    pub(crate) fn into_domain(self) -> Result<Payment, RepositoryError> {
        let method = self
            .method
            .parse()
            .map_err(|err: String| RepositoryError::query(err))?;
        let status = self
            .status
            .parse()
            .map_err(|err: String| RepositoryError::query(err))?;
        Ok(Payment {
            id: PaymentId::from_uuid(self.id),
            principal: PrincipalId::from_uuid(self.principal_id),
            voucher: self.voucher_id.map(VoucherId::from_uuid),
            amount_minor: self.amount_minor,
            currency: self.currency,
            method,
            status,
            transaction_id: self.transaction_id,
            completed_at: self.completed_at,
        })
    }
}

/// Row struct for reading from the access_sessions table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = access_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AccessSessionRow {
    pub token: Uuid,
    pub principal_id: Uuid,
    pub device_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessSessionRow {
    pub(crate) fn into_domain(self) -> Result<AccessSession, RepositoryError> {
        let device = DeviceId::new(&self.device_id)
            .map_err(|err| RepositoryError::query(err.to_string()))?;
        Ok(AccessSession {
            token: SessionToken::from_uuid(self.token),
            principal: PrincipalId::from_uuid(self.principal_id),
            device,
            expires_at: self.expires_at,
        })
    }
}

/// Insertable struct for creating session ledger entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = access_sessions)]
pub(crate) struct NewAccessSessionRow<'a> {
    pub token: Uuid,
    pub principal_id: Uuid,
    pub device_id: &'a str,
    pub expires_at: DateTime<Utc>,
}
