//! Credential resolution.
//!
//! Turns a submitted identifier plus optional secret into a principal and
//! the voucher that applies to it. Login identifiers win over voucher codes
//! when both could match. The resolver never mutates state; voucher
//! transitions happen only after evaluation succeeds.

use std::sync::Arc;

use crate::domain::principal::{LoginIdentifier, Principal, PrincipalId};
use crate::domain::ports::{PrincipalRepository, RepositoryError, VoucherRepository};
use crate::domain::voucher::{Voucher, VoucherCode, VoucherStatus};

/// Resolution result handed to the entitlement evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Candidate principal the decision is made for.
    pub principal: Principal,
    /// Voucher attached to the credential, if the identifier was a code.
    pub voucher: Option<Voucher>,
}

/// Resolution failures. All of them surface externally as a generic denial.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Neither a principal login nor a voucher code matched.
    #[error("identifier matched no principal or voucher")]
    NotFound,
    /// The principal matched but the presented secret did not verify.
    #[error("presented secret did not verify")]
    InvalidSecret,
    /// The candidate principal is deactivated.
    #[error("candidate principal is inactive")]
    InactivePrincipal,
    /// Storage failure while resolving.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Resolves submitted identifiers against the identity and voucher stores.
pub struct CredentialResolver {
    principals: Arc<dyn PrincipalRepository>,
    vouchers: Arc<dyn VoucherRepository>,
}

impl CredentialResolver {
    /// Build a resolver over the given stores.
    pub fn new(
        principals: Arc<dyn PrincipalRepository>,
        vouchers: Arc<dyn VoucherRepository>,
    ) -> Self {
        Self {
            principals,
            vouchers,
        }
    }

    /// Resolve `identifier` (+ optional `secret`) to a principal.
    pub async fn resolve(
        &self,
        identifier: &str,
        secret: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        if let Ok(login) = LoginIdentifier::new(identifier) {
            if let Some(principal) = self.principals.find_by_login(&login).await? {
                return self.resolve_login(principal, identifier, secret).await;
            }
        }
        self.resolve_voucher_code(identifier).await
    }

    /// A login matched. Verify the secret, then attach the voucher when the
    /// login itself is a voucher code, so voucher-derived principals keep
    /// their entitlement on re-authentication.
    async fn resolve_login(
        &self,
        principal: Principal,
        identifier: &str,
        secret: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        if !principal.active {
            return Err(ResolveError::InactivePrincipal);
        }
        if let Some(digest) = &principal.password_digest {
            let verified = secret.is_some_and(|s| digest.verify(s));
            if !verified {
                return Err(ResolveError::InvalidSecret);
            }
        }

        let voucher = match VoucherCode::new(identifier) {
            Ok(code) => self.vouchers.find_by_code(&code).await?,
            Err(_) => None,
        };
        Ok(Resolution { principal, voucher })
    }

    /// No login matched; treat the identifier as a voucher code.
    async fn resolve_voucher_code(&self, identifier: &str) -> Result<Resolution, ResolveError> {
        let code = VoucherCode::new(identifier).map_err(|_| ResolveError::NotFound)?;
        let voucher = self
            .vouchers
            .find_by_code(&code)
            .await?
            .ok_or(ResolveError::NotFound)?;

        let candidate = match voucher.status {
            // Expired vouchers still resolve so the evaluator can deny with
            // the expiry reason and trigger the lazy transition.
            VoucherStatus::Active | VoucherStatus::Expired => voucher.issuer.clone(),
            VoucherStatus::Used => voucher
                .used_by
                .clone()
                .ok_or(ResolveError::NotFound)?,
            VoucherStatus::Cancelled => return Err(ResolveError::NotFound),
        };

        let principal = self.load_principal(&candidate).await?;
        if !principal.active {
            return Err(ResolveError::InactivePrincipal);
        }
        Ok(Resolution {
            principal,
            voucher: Some(voucher),
        })
    }

    async fn load_principal(&self, id: &PrincipalId) -> Result<Principal, ResolveError> {
        self.principals
            .find_by_id(id)
            .await?
            .ok_or(ResolveError::NotFound)
    }
}
