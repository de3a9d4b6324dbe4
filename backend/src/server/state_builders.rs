//! Builders selecting database-backed or in-memory adapters for the ports.

use std::sync::Arc;

use actix_web::web;
use mockable::{Clock, DefaultClock};

use crate::domain::ports::{
    AuthorizeAccess, PaymentRepository, PaymentStatusQuery, PrincipalRepository, RedeemVoucher,
    SessionLedger, SubscriptionRepository, VoucherRepository,
};
use crate::domain::{AuthorizationPorts, AuthorizationService, ReconciliationWorker};
use crate::inbound::http::state::HttpState;
use crate::outbound::memory::{
    InMemoryPayments, InMemoryPrincipals, InMemorySessions, InMemorySubscriptions,
    InMemoryVouchers,
};
use crate::outbound::persistence::{
    DieselPaymentRepository, DieselPrincipalRepository, DieselSessionLedger,
    DieselSubscriptionRepository, DieselVoucherRepository,
};
use crate::outbound::rate_limit::InMemoryRateLimitStore;

use super::ServerConfig;

/// Repository bundle shared by the authorization service and the worker.
struct Repositories {
    principals: Arc<dyn PrincipalRepository>,
    vouchers: Arc<dyn VoucherRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    payments: Arc<dyn PaymentRepository>,
    sessions: Arc<dyn SessionLedger>,
}

fn build_repositories(config: &ServerConfig) -> Repositories {
    match &config.db_pool {
        Some(pool) => Repositories {
            principals: Arc::new(DieselPrincipalRepository::new(pool.clone())),
            vouchers: Arc::new(DieselVoucherRepository::new(pool.clone())),
            subscriptions: Arc::new(DieselSubscriptionRepository::new(pool.clone())),
            payments: Arc::new(DieselPaymentRepository::new(pool.clone())),
            sessions: Arc::new(DieselSessionLedger::new(pool.clone())),
        },
        None => Repositories {
            principals: Arc::new(InMemoryPrincipals::default()),
            vouchers: Arc::new(InMemoryVouchers::default()),
            subscriptions: Arc::new(InMemorySubscriptions::default()),
            payments: Arc::new(InMemoryPayments::default()),
            sessions: Arc::new(InMemorySessions::default()),
        },
    }
}

/// Build the shared HTTP state and the reconciliation worker from the
/// configured adapters.
pub(super) fn build_services(
    config: &ServerConfig,
) -> (web::Data<HttpState>, Arc<ReconciliationWorker>) {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let repos = build_repositories(config);

    let throttle = Arc::new(InMemoryRateLimitStore::new(
        config.rate_limit_window,
        config.rate_limit_max_attempts,
        Arc::clone(&clock),
    ));

    let service = Arc::new(AuthorizationService::new(
        AuthorizationPorts {
            principals: Arc::clone(&repos.principals),
            vouchers: Arc::clone(&repos.vouchers),
            subscriptions: Arc::clone(&repos.subscriptions),
            sessions: Arc::clone(&repos.sessions),
            throttle,
        },
        Arc::clone(&clock),
    ));

    let worker = Arc::new(ReconciliationWorker::new(
        repos.payments,
        repos.vouchers,
        config.providers.clone(),
        clock,
    ));

    let http_state = web::Data::new(HttpState::new(
        Arc::clone(&service) as Arc<dyn AuthorizeAccess>,
        service as Arc<dyn RedeemVoucher>,
        Arc::clone(&worker) as Arc<dyn PaymentStatusQuery>,
    ));

    (http_state, worker)
}
