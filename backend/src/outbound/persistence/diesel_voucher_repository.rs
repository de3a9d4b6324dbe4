//! PostgreSQL-backed `VoucherRepository` implementation using Diesel ORM.
//!
//! The redemption transition is a single conditional `UPDATE`: the row must
//! still be `ACTIVE` with a null `used_by` for the write to apply. Zero
//! affected rows with an existing voucher means the race was lost, never an
//! error, so concurrent access points converge on one winner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{RedemptionOutcome, RepositoryError, VoucherRepository};
use crate::domain::principal::PrincipalId;
use crate::domain::voucher::{Voucher, VoucherCode, VoucherId, VoucherStatus};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::VoucherRow;
use super::pool::DbPool;
use super::schema::vouchers;

/// Diesel-backed implementation of the voucher repository port.
#[derive(Clone)]
pub struct DieselVoucherRepository {
    pool: DbPool,
}

impl DieselVoucherRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoucherRepository for DieselVoucherRepository {
    async fn find_by_code(&self, code: &VoucherCode) -> Result<Option<Voucher>, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<VoucherRow> = vouchers::table
            .filter(vouchers::code.eq(code.as_str()))
            .select(VoucherRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(VoucherRow::into_domain).transpose()
    }

    async fn find_by_id(&self, id: &VoucherId) -> Result<Option<Voucher>, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<VoucherRow> = vouchers::table
            .find(id.as_uuid())
            .select(VoucherRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(VoucherRow::into_domain).transpose()
    }

    async fn redeem(
        &self,
        id: &VoucherId,
        principal: &PrincipalId,
        at: DateTime<Utc>,
    ) -> Result<RedemptionOutcome, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated: Option<VoucherRow> = diesel::update(
            vouchers::table
                .find(id.as_uuid())
                .filter(vouchers::status.eq(VoucherStatus::Active.as_str()))
                .filter(vouchers::used_by.is_null()),
        )
        .set((
            vouchers::status.eq(VoucherStatus::Used.as_str()),
            vouchers::used_by.eq(principal.as_uuid()),
            vouchers::used_at.eq(at),
        ))
        .returning(VoucherRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        match updated {
            Some(row) => Ok(RedemptionOutcome::Redeemed(row.into_domain()?)),
            None => {
                // Distinguish a lost race from a missing voucher.
                let exists: i64 = vouchers::table
                    .find(id.as_uuid())
                    .count()
                    .get_result(&mut conn)
                    .await
                    .map_err(map_diesel_error)?;
                if exists == 0 {
                    Err(RepositoryError::query("voucher not found"))
                } else {
                    Ok(RedemptionOutcome::RaceLost)
                }
            }
        }
    }

    async fn mark_expired(&self, id: &VoucherId) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let affected = diesel::update(
            vouchers::table
                .find(id.as_uuid())
                .filter(vouchers::status.eq(VoucherStatus::Active.as_str())),
        )
        .set(vouchers::status.eq(VoucherStatus::Expired.as_str()))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(affected > 0)
    }
}
