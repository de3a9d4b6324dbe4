//! PostgreSQL-backed `PaymentRepository` implementation using Diesel ORM.
//!
//! Terminal transitions are conditional `UPDATE`s filtered on the stored
//! status still being `PENDING`, so replayed reconciliations never flip a
//! settled payment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{PaymentRepository, RepositoryError, SettlementOutcome};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::PaymentRow;
use super::pool::DbPool;
use super::schema::payments;

/// Diesel-backed implementation of the payment repository port.
#[derive(Clone)]
pub struct DieselPaymentRepository {
    pool: DbPool,
}

impl DieselPaymentRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Resolve a zero-row conditional update: either the payment is already
    /// terminal, or it does not exist at all.
    async fn read_terminal(
        &self,
        id: &PaymentId,
    ) -> Result<SettlementOutcome, RepositoryError> {
        let stored = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::query("payment not found"))?;
        Ok(SettlementOutcome::AlreadyTerminal(stored))
    }
}

#[async_trait]
impl PaymentRepository for DieselPaymentRepository {
    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<PaymentRow> = payments::table
            .find(id.as_uuid())
            .select(PaymentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(PaymentRow::into_domain).transpose()
    }

    async fn list_pending(&self) -> Result<Vec<Payment>, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<PaymentRow> = payments::table
            .filter(payments::status.eq(PaymentStatus::Pending.as_str()))
            .select(PaymentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(PaymentRow::into_domain).collect()
    }

    async fn complete(
        &self,
        id: &PaymentId,
        at: DateTime<Utc>,
    ) -> Result<SettlementOutcome, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated: Option<PaymentRow> = diesel::update(
            payments::table
                .find(id.as_uuid())
                .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
        )
        .set((
            payments::status.eq(PaymentStatus::Completed.as_str()),
            payments::completed_at.eq(at),
        ))
        .returning(PaymentRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        match updated {
            Some(row) => Ok(SettlementOutcome::Applied(row.into_domain()?)),
            None => self.read_terminal(id).await,
        }
    }

    async fn fail(&self, id: &PaymentId) -> Result<SettlementOutcome, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated: Option<PaymentRow> = diesel::update(
            payments::table
                .find(id.as_uuid())
                .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
        )
        .set(payments::status.eq(PaymentStatus::Failed.as_str()))
        .returning(PaymentRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        match updated {
            Some(row) => Ok(SettlementOutcome::Applied(row.into_domain()?)),
            None => self.read_terminal(id).await,
        }
    }
}
