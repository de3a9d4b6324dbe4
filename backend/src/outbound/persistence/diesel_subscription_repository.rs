//! PostgreSQL-backed `SubscriptionRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{RepositoryError, SubscriptionRepository};
use crate::domain::principal::PrincipalId;
use crate::domain::subscription::{Subscription, SubscriptionStatus};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::SubscriptionRow;
use super::pool::DbPool;
use super::schema::subscriptions;

/// Diesel-backed implementation of the subscription repository port.
#[derive(Clone)]
pub struct DieselSubscriptionRepository {
    pool: DbPool,
}

impl DieselSubscriptionRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for DieselSubscriptionRepository {
    async fn current_for_principal(
        &self,
        principal: &PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<SubscriptionRow> = subscriptions::table
            .filter(subscriptions::principal_id.eq(principal.as_uuid()))
            .filter(subscriptions::status.eq(SubscriptionStatus::Active.as_str()))
            .filter(subscriptions::start_date.le(now))
            .filter(
                subscriptions::end_date
                    .is_null()
                    .or(subscriptions::end_date.gt(now)),
            )
            .order(subscriptions::start_date.desc())
            .select(SubscriptionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(SubscriptionRow::into_domain).transpose()
    }
}
