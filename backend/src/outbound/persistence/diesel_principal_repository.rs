//! PostgreSQL-backed `PrincipalRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{PrincipalRepository, RepositoryError};
use crate::domain::principal::{LoginIdentifier, Principal, PrincipalId};

use super::diesel_error_mapping::{map_diesel_error, map_pool_error};
use super::models::{NewPrincipalRow, PrincipalRow};
use super::pool::DbPool;
use super::schema::principals;

/// Diesel-backed implementation of the principal repository port.
#[derive(Clone)]
pub struct DieselPrincipalRepository {
    pool: DbPool,
}

impl DieselPrincipalRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalRepository for DieselPrincipalRepository {
    async fn find_by_login(
        &self,
        login: &LoginIdentifier,
    ) -> Result<Option<Principal>, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<PrincipalRow> = principals::table
            .filter(principals::login.eq(login.as_str()))
            .select(PrincipalRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(PrincipalRow::into_domain).transpose()
    }

    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Principal>, RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<PrincipalRow> = principals::table
            .find(id.as_uuid())
            .select(PrincipalRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(PrincipalRow::into_domain).transpose()
    }

    async fn create(&self, principal: &Principal) -> Result<(), RepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewPrincipalRow {
            id: *principal.id.as_uuid(),
            login: principal.login.as_str(),
            active: principal.active,
            password_digest: principal.password_digest.as_ref().map(|d| d.as_hex()),
        };
        diesel::insert_into(principals::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }
}
