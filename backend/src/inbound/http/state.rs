//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{AuthorizeAccess, PaymentStatusQuery, RedeemVoucher};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// NAS-facing authorization use-case.
    pub authorize: Arc<dyn AuthorizeAccess>,
    /// Explicit voucher redemption use-case.
    pub redemptions: Arc<dyn RedeemVoucher>,
    /// Payment status polling use-case.
    pub payments: Arc<dyn PaymentStatusQuery>,
}

impl HttpState {
    /// Build the handler state from its use-case ports.
    pub fn new(
        authorize: Arc<dyn AuthorizeAccess>,
        redemptions: Arc<dyn RedeemVoucher>,
        payments: Arc<dyn PaymentStatusQuery>,
    ) -> Self {
        Self {
            authorize,
            redemptions,
            payments,
        }
    }
}
