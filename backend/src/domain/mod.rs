//! Domain primitives, aggregates, and the authorization core.
//!
//! Purpose: express the access-authorization semantics independently of
//! transport and storage. Entities are strongly typed and immutable; state
//! transitions live behind ports so adapters can honour the conditional
//! write discipline the voucher and payment lifecycles require.

pub mod authorization;
pub mod credential;
pub mod decision;
pub mod entitlement;
pub mod error;
pub mod payment;
pub mod ports;
pub mod principal;
pub mod reconciliation;
pub mod session;
pub mod subscription;
pub mod voucher;

pub use self::authorization::{AuthorizationPorts, AuthorizationService};
pub use self::credential::{CredentialResolver, ResolveError, Resolution};
pub use self::decision::{
    AccessDecision, AccessGrant, AccessRequest, DENIAL_MESSAGE, DenyReason, RedemptionReceipt,
    RedemptionRequest,
};
pub use self::entitlement::{Entitlement, EntitlementLimits, EvaluationError, evaluate};
pub use self::error::{DomainError, ErrorCode};
pub use self::payment::{Payment, PaymentId, PaymentMethod, PaymentStatus};
pub use self::principal::{LoginIdentifier, PasswordDigest, Principal, PrincipalId};
pub use self::reconciliation::{
    ReconcileOutcome, ReconciliationRuntime, ReconciliationWorker, SweepJitter, SweepReport,
    SweepSleeper, TokioSleeper,
};
pub use self::session::{AccessSession, DeviceId, SessionToken};
pub use self::subscription::{Subscription, SubscriptionId, SubscriptionStatus};
pub use self::voucher::{Voucher, VoucherCode, VoucherId, VoucherStatus};

/// Convenient domain result alias.
pub type DomainResult<T> = Result<T, DomainError>;
