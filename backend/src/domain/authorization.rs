//! Authorization orchestration.
//!
//! Ties the resolver, evaluator, voucher state machine, and session ledger
//! into the NAS-facing decision pipeline, and exposes the explicit voucher
//! redemption operation used by the portal's purchase flow. All denial
//! reasons stay internal; callers receive a decision plus the uniform
//! external message.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;

use crate::domain::credential::{CredentialResolver, ResolveError, Resolution};
use crate::domain::decision::{
    AccessDecision, AccessGrant, AccessRequest, DenyReason, RedemptionReceipt, RedemptionRequest,
};
use crate::domain::entitlement::{Entitlement, EvaluationError, evaluate};
use crate::domain::error::DomainError;
use crate::domain::ports::{
    AuthorizeAccess, PrincipalRepository, RateLimitDecision, RateLimitStore, RedeemVoucher,
    RedemptionOutcome, SessionLedger, SubscriptionRepository, VoucherRepository,
};
use crate::domain::principal::{LoginIdentifier, Principal, PrincipalId};
use crate::domain::session::{AccessSession, SessionToken};
use crate::domain::voucher::{Voucher, VoucherStatus};

/// Port bundle required by the authorization service.
pub struct AuthorizationPorts {
    /// Principal identity store.
    pub principals: Arc<dyn PrincipalRepository>,
    /// Voucher store with the conditional redemption write.
    pub vouchers: Arc<dyn VoucherRepository>,
    /// Subscription store.
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    /// Session ledger.
    pub sessions: Arc<dyn SessionLedger>,
    /// Brute-force throttle.
    pub throttle: Arc<dyn RateLimitStore>,
}

/// NAS-facing authorization service.
pub struct AuthorizationService {
    resolver: CredentialResolver,
    principals: Arc<dyn PrincipalRepository>,
    vouchers: Arc<dyn VoucherRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    sessions: Arc<dyn SessionLedger>,
    throttle: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

/// Whether a pipeline run may write state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Consume vouchers and record the session.
    Commit,
    /// Evaluate only; the grant carries a preview session that is never
    /// persisted.
    Preview,
}

impl AuthorizationService {
    /// Build the service over the given ports.
    pub fn new(ports: AuthorizationPorts, clock: Arc<dyn Clock>) -> Self {
        let resolver =
            CredentialResolver::new(Arc::clone(&ports.principals), Arc::clone(&ports.vouchers));
        Self {
            resolver,
            principals: ports.principals,
            vouchers: ports.vouchers,
            subscriptions: ports.subscriptions,
            sessions: ports.sessions,
            throttle: ports.throttle,
            clock,
        }
    }

    async fn decide(
        &self,
        request: &AccessRequest,
        mode: Mode,
    ) -> Result<AccessDecision, DomainError> {
        let resolution = match self
            .resolver
            .resolve(&request.identifier, request.secret.as_deref())
            .await
        {
            Ok(resolution) => resolution,
            Err(ResolveError::NotFound) => return Ok(deny(DenyReason::UnknownCredential)),
            Err(ResolveError::InvalidSecret) => return Ok(deny(DenyReason::InvalidSecret)),
            Err(ResolveError::InactivePrincipal) => return Ok(deny(DenyReason::AccountInactive)),
            Err(ResolveError::Repository(err)) => return Err(err.into()),
        };

        let now = self.clock.utc();
        let subscription = self
            .subscriptions
            .current_for_principal(&resolution.principal.id, now)
            .await?;

        let entitlement = match evaluate(
            &resolution.principal,
            resolution.voucher.as_ref(),
            subscription.as_ref(),
            now,
        ) {
            Ok(entitlement) => entitlement,
            Err(err) => {
                return self
                    .deny_from_evaluation(err, resolution.voucher.as_ref(), mode)
                    .await;
            }
        };

        if mode == Mode::Commit
            && let Some(voucher) = contributing_active_voucher(&resolution, &entitlement)
        {
            let outcome = self
                .vouchers
                .redeem(&voucher.id, &resolution.principal.id, now)
                .await?;
            if matches!(outcome, RedemptionOutcome::RaceLost) {
                return Ok(deny(DenyReason::VoucherRaceLost));
            }
            tracing::info!(
                voucher = %voucher.code,
                principal = %resolution.principal.id,
                "voucher consumed during authorization"
            );
        }

        let granted_seconds = i64::try_from(entitlement.session_seconds).unwrap_or(i64::MAX);
        let expires_at = now + chrono::Duration::seconds(granted_seconds);
        let session = match mode {
            Mode::Commit => {
                self.sessions
                    .upsert(&resolution.principal.id, &request.device, expires_at)
                    .await?
            }
            Mode::Preview => AccessSession {
                token: SessionToken::random(),
                principal: resolution.principal.id.clone(),
                device: request.device.clone(),
                expires_at,
            },
        };

        Ok(AccessDecision::Grant(Box::new(AccessGrant {
            principal: resolution.principal,
            entitlement,
            session,
        })))
    }

    /// Map an evaluation error to a denial, applying the lazy expiry
    /// transition when a committing run observed an elapsed voucher.
    async fn deny_from_evaluation(
        &self,
        err: EvaluationError,
        voucher: Option<&Voucher>,
        mode: Mode,
    ) -> Result<AccessDecision, DomainError> {
        let reason = match err {
            EvaluationError::AccountInactive => DenyReason::AccountInactive,
            EvaluationError::NoEntitlement => DenyReason::NoEntitlement,
            EvaluationError::VoucherAlreadyUsed => DenyReason::VoucherAlreadyUsed,
            EvaluationError::VoucherExpired => {
                if mode == Mode::Commit
                    && let Some(v) = voucher.filter(|v| v.status == VoucherStatus::Active)
                {
                    let transitioned = self.vouchers.mark_expired(&v.id).await?;
                    if transitioned {
                        tracing::info!(voucher = %v.code, "voucher lazily expired");
                    }
                }
                DenyReason::VoucherExpired
            }
        };
        Ok(deny(reason))
    }

    /// Resolve the redeeming principal, synthesising one from the code when
    /// the caller supplied none.
    async fn redeeming_principal(
        &self,
        request: &RedemptionRequest,
        voucher: &Voucher,
    ) -> Result<PrincipalId, DomainError> {
        if let Some(id) = &request.principal {
            return match self.principals.find_by_id(id).await? {
                Some(principal) => Ok(principal.id),
                None => Err(DomainError::not_found("redeeming principal not found")),
            };
        }

        let login = LoginIdentifier::new(voucher.code.as_str())
            .map_err(|err| DomainError::invalid_request(err.to_string()))?;
        if let Some(existing) = self.principals.find_by_login(&login).await? {
            return Ok(existing.id);
        }

        let synthesised = Principal::derived_from_voucher(&voucher.code)
            .map_err(|err| DomainError::invalid_request(err.to_string()))?;
        self.principals.create(&synthesised).await?;
        tracing::info!(
            principal = %synthesised.id,
            login = %synthesised.login,
            "synthesised principal for voucher redemption"
        );
        Ok(synthesised.id)
    }
}

fn deny(reason: DenyReason) -> AccessDecision {
    tracing::info!(reason = reason.log_label(), "authorization denied");
    AccessDecision::Deny(reason)
}

/// The voucher to consume on a grant: only a still `ACTIVE` voucher that
/// actually contributed needs the state transition. Re-authorization with an
/// already consumed voucher leaves the record untouched.
fn contributing_active_voucher<'a>(
    resolution: &'a Resolution,
    entitlement: &Entitlement,
) -> Option<&'a Voucher> {
    resolution
        .voucher
        .as_ref()
        .filter(|v| entitlement.source_voucher.as_ref() == Some(&v.id))
        .filter(|v| v.status == VoucherStatus::Active)
}

#[async_trait]
impl AuthorizeAccess for AuthorizationService {
    async fn authorize(&self, request: AccessRequest) -> Result<AccessDecision, DomainError> {
        if self.throttle.register_attempt(&request.throttle_key()) == RateLimitDecision::Limited {
            tracing::warn!(device = %request.device, "authorization attempt throttled");
            return Ok(AccessDecision::Deny(DenyReason::RateLimited));
        }
        self.decide(&request, Mode::Commit).await
    }

    async fn check(&self, request: AccessRequest) -> Result<AccessDecision, DomainError> {
        self.decide(&request, Mode::Preview).await
    }
}

#[async_trait]
impl RedeemVoucher for AuthorizationService {
    async fn redeem(
        &self,
        request: RedemptionRequest,
    ) -> Result<RedemptionReceipt, DomainError> {
        let code = crate::domain::voucher::VoucherCode::new(&request.code)
            .map_err(|err| DomainError::invalid_request(err.to_string()))?;
        let voucher = self
            .vouchers
            .find_by_code(&code)
            .await?
            .ok_or_else(|| DomainError::not_found("voucher not found"))?;
        let now = request.requested_at;

        match voucher.status {
            VoucherStatus::Cancelled => {
                return Err(DomainError::conflict("voucher has been cancelled"));
            }
            VoucherStatus::Expired => {
                return Err(DomainError::conflict("voucher has expired"));
            }
            VoucherStatus::Used => {
                let principal = self.redeeming_principal(&request, &voucher).await?;
                return if voucher.used_by.as_ref() == Some(&principal) {
                    // Replayed redemption by the same principal is a no-op.
                    Ok(RedemptionReceipt { voucher, principal })
                } else {
                    Err(DomainError::conflict("voucher already redeemed"))
                };
            }
            VoucherStatus::Active => {}
        }

        if voucher.is_expired(now) {
            let transitioned = self.vouchers.mark_expired(&voucher.id).await?;
            if transitioned {
                tracing::info!(voucher = %voucher.code, "voucher lazily expired");
            }
            return Err(DomainError::conflict("voucher has expired"));
        }
        if voucher.is_not_yet_valid(now) {
            return Err(DomainError::conflict("voucher is not yet valid"));
        }

        let principal = self.redeeming_principal(&request, &voucher).await?;
        match self.vouchers.redeem(&voucher.id, &principal, now).await? {
            RedemptionOutcome::Redeemed(voucher) => {
                tracing::info!(
                    voucher = %voucher.code,
                    principal = %principal,
                    "voucher redeemed"
                );
                Ok(RedemptionReceipt { voucher, principal })
            }
            RedemptionOutcome::RaceLost => {
                tracing::warn!(voucher = %voucher.code, "voucher redemption lost the race");
                Err(DomainError::conflict("voucher already redeemed"))
            }
        }
    }
}
