//! PostgreSQL-backed `SessionLedger` implementation using Diesel ORM.
//!
//! The upsert targets the unique (principal, device) index: conflicts update
//! only `expires_at`, keeping the existing token, so re-authorization for
//! the same device never mints a second session row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{RepositoryError, SessionLedger};
use crate::domain::principal::PrincipalId;
use crate::domain::session::{AccessSession, DeviceId, SessionToken};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{AccessSessionRow, NewAccessSessionRow};
use super::pool::DbPool;
use super::schema::access_sessions;

/// Diesel-backed implementation of the session ledger port.
#[derive(Clone)]
pub struct DieselSessionLedger {
    pool: DbPool,
}

impl DieselSessionLedger {
    /// Create a new ledger with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionLedger for DieselSessionLedger {
    async fn upsert(
        &self,
        principal: &PrincipalId,
        device: &DeviceId,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessSession, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewAccessSessionRow {
            token: *SessionToken::random().as_uuid(),
            principal_id: *principal.as_uuid(),
            device_id: device.as_str(),
            expires_at,
        };
        let stored: AccessSessionRow = diesel::insert_into(access_sessions::table)
            .values(&row)
            .on_conflict((access_sessions::principal_id, access_sessions::device_id))
            .do_update()
            .set(access_sessions::expires_at.eq(expires_at))
            .returning(AccessSessionRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        stored.into_domain()
    }

    async fn find(
        &self,
        principal: &PrincipalId,
        device: &DeviceId,
    ) -> Result<Option<AccessSession>, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AccessSessionRow> = access_sessions::table
            .filter(access_sessions::principal_id.eq(principal.as_uuid()))
            .filter(access_sessions::device_id.eq(device.as_str()))
            .select(AccessSessionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(AccessSessionRow::into_domain).transpose()
    }
}
