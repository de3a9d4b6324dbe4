//! Domain ports defining the edges of the hexagon.
//!
//! Driven ports describe how the domain expects to reach storage and the
//! mobile-money providers; driving ports are the use-case surface the HTTP
//! layer and the reconciliation worker call into. Each trait exposes
//! strongly typed errors so adapters map their failures into predictable
//! variants instead of returning `anyhow::Result`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::decision::{AccessDecision, AccessRequest, RedemptionReceipt, RedemptionRequest};
use super::error::DomainError;
use super::payment::{Payment, PaymentId, PaymentMethod};
use super::principal::{LoginIdentifier, Principal, PrincipalId};
use super::session::{AccessSession, DeviceId};
use super::subscription::Subscription;
use super::voucher::{Voucher, VoucherCode, VoucherId};

/// Persistence errors raised by repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Repository connection could not be established.
    #[error("repository connection failed: {message}")]
    Connection { message: String },
    /// Query or mutation failed during execution.
    #[error("repository query failed: {message}")]
    Query { message: String },
}

impl RepositoryError {
    /// Helper for connection oriented failures.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Helper for query failures.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

impl From<RepositoryError> for DomainError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Connection { .. } => {
                Self::service_unavailable("storage is temporarily unavailable")
            }
            RepositoryError::Query { message } => Self::internal(message),
        }
    }
}

/// Persistence port for principal identities.
#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    /// Fetch a principal by normalised login.
    async fn find_by_login(
        &self,
        login: &LoginIdentifier,
    ) -> Result<Option<Principal>, RepositoryError>;

    /// Fetch a principal by identifier.
    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Principal>, RepositoryError>;

    /// Insert a newly synthesised principal.
    async fn create(&self, principal: &Principal) -> Result<(), RepositoryError>;
}

/// Result of the conditional redemption write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedemptionOutcome {
    /// This caller won the transition; the voucher is returned post-write.
    Redeemed(Voucher),
    /// A concurrent caller consumed the voucher first.
    RaceLost,
}

/// Persistence port for vouchers.
///
/// `redeem` is the exactly-once consumption primitive: adapters must issue a
/// single conditional write that succeeds only while the voucher is still
/// `ACTIVE` with no consumer recorded, and report [`RedemptionOutcome::RaceLost`]
/// when the condition no longer holds.
#[async_trait]
pub trait VoucherRepository: Send + Sync {
    /// Fetch a voucher by redemption code.
    async fn find_by_code(&self, code: &VoucherCode) -> Result<Option<Voucher>, RepositoryError>;

    /// Fetch a voucher by identifier.
    async fn find_by_id(&self, id: &VoucherId) -> Result<Option<Voucher>, RepositoryError>;

    /// Atomically consume the voucher for `principal`.
    async fn redeem(
        &self,
        id: &VoucherId,
        principal: &PrincipalId,
        at: DateTime<Utc>,
    ) -> Result<RedemptionOutcome, RepositoryError>;

    /// Transition an `ACTIVE` voucher whose window has elapsed to `EXPIRED`.
    /// Returns whether this caller performed the transition.
    async fn mark_expired(&self, id: &VoucherId) -> Result<bool, RepositoryError>;
}

/// Persistence port for subscriptions.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Fetch the principal's authoritative subscription at `now`: the most
    /// recently started `active` one whose end date has not passed.
    async fn current_for_principal(
        &self,
        principal: &PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, RepositoryError>;
}

/// Result of a conditional terminal transition on a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The transition was applied by this caller.
    Applied(Payment),
    /// The payment was already terminal; the stored record is returned
    /// unchanged.
    AlreadyTerminal(Payment),
}

/// Persistence port for payments.
///
/// Terminal transitions are conditional on the stored status still being
/// `PENDING`, so replayed reconciliations can never flip a settled payment.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Fetch a payment by identifier.
    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError>;

    /// List payments still awaiting settlement.
    async fn list_pending(&self) -> Result<Vec<Payment>, RepositoryError>;

    /// Mark the payment `COMPLETED` at `at` if it is still pending.
    async fn complete(
        &self,
        id: &PaymentId,
        at: DateTime<Utc>,
    ) -> Result<SettlementOutcome, RepositoryError>;

    /// Mark the payment `FAILED` if it is still pending.
    async fn fail(&self, id: &PaymentId) -> Result<SettlementOutcome, RepositoryError>;
}

/// Persistence port for the session ledger.
#[async_trait]
pub trait SessionLedger: Send + Sync {
    /// Record a grant for the principal and device, refreshing `expires_at`
    /// and keeping the existing token when an entry already exists.
    async fn upsert(
        &self,
        principal: &PrincipalId,
        device: &DeviceId,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessSession, RepositoryError>;

    /// Fetch the current ledger entry for the principal and device.
    async fn find(
        &self,
        principal: &PrincipalId,
        device: &DeviceId,
    ) -> Result<Option<AccessSession>, RepositoryError>;
}

/// Settlement state reported by a mobile-money provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderPaymentStatus {
    /// Funds collected.
    Successful,
    /// Collection rejected or abandoned.
    Failed,
    /// Still awaiting payer action.
    Pending,
}

/// Errors surfaced by provider adapters. All of them leave the payment
/// pending; the next sweep retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentProviderError {
    /// The provider did not answer within the configured deadline.
    #[error("payment provider timed out: {message}")]
    Timeout { message: String },
    /// Connection-level failure reaching the provider.
    #[error("payment provider transport failed: {message}")]
    Transport { message: String },
    /// The provider answered with an unparseable body.
    #[error("payment provider response could not be decoded: {message}")]
    Decode { message: String },
    /// The provider rejected the request itself.
    #[error("payment provider rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl PaymentProviderError {
    /// Helper for deadline overruns.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Helper for transport failures.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Helper for body decoding failures.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Helper for HTTP-level rejections.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

/// Charge initiation parameters passed to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentChargeRequest {
    /// Our payment identifier, echoed to the provider as external reference.
    pub payment_id: PaymentId,
    /// Amount in minor currency units.
    pub amount_minor: i64,
    /// ISO currency code.
    pub currency: String,
    /// Payer's mobile-money number in MSISDN form.
    pub payer_msisdn: String,
}

/// Outbound port for one mobile-money scheme.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Scheme this adapter collects for.
    fn method(&self) -> PaymentMethod;

    /// Initiate a collection and return the provider's transaction
    /// identifier.
    async fn request_payment(
        &self,
        charge: &PaymentChargeRequest,
    ) -> Result<String, PaymentProviderError>;

    /// Query the settlement state of a previously initiated collection.
    async fn check_status(
        &self,
        transaction_id: &str,
    ) -> Result<ProviderPaymentStatus, PaymentProviderError>;
}

/// Lookup table from payment method to its provider adapter.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<PaymentMethod, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    /// Register a provider under its own method, replacing any previous one.
    #[must_use]
    pub fn with(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.method(), provider);
        self
    }

    /// Fetch the provider for a method.
    pub fn get(&self, method: PaymentMethod) -> Option<Arc<dyn PaymentProvider>> {
        self.providers.get(&method).cloned()
    }
}

/// Verdict of the brute-force throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Attempt admitted.
    Allowed,
    /// Attempt budget for the window is exhausted.
    Limited,
}

/// Throttle port keyed by identifier and device.
pub trait RateLimitStore: Send + Sync {
    /// Record one attempt and report whether it is admitted.
    fn register_attempt(&self, key: &str) -> RateLimitDecision;
}

/// Driving port for NAS-facing authorization.
#[async_trait]
pub trait AuthorizeAccess: Send + Sync {
    /// Full authorization: throttles, resolves, evaluates, consumes a
    /// contributing voucher, and records the session.
    async fn authorize(&self, request: AccessRequest) -> Result<AccessDecision, DomainError>;

    /// Read-only pre-check: same pipeline without throttle registration,
    /// voucher consumption, or ledger writes.
    async fn check(&self, request: AccessRequest) -> Result<AccessDecision, DomainError>;
}

/// Driving port for explicit voucher redemption.
#[async_trait]
pub trait RedeemVoucher: Send + Sync {
    /// Consume a voucher for a principal, synthesising one when absent.
    async fn redeem(&self, request: RedemptionRequest)
    -> Result<RedemptionReceipt, DomainError>;
}

/// Driving port for payment status queries.
#[async_trait]
pub trait PaymentStatusQuery: Send + Sync {
    /// Reconcile the payment against its provider, then return the stored
    /// record.
    async fn poll(&self, id: &PaymentId) -> Result<Payment, DomainError>;
}
