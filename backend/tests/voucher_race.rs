//! Concurrency tests for exactly-once voucher consumption.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use mockable::{Clock, DefaultClock};

use backend::domain::ports::{RedeemVoucher, RedemptionOutcome, VoucherRepository};
use backend::domain::{
    AuthorizationPorts, AuthorizationService, EntitlementLimits, ErrorCode, LoginIdentifier,
    Principal, PrincipalId, RedemptionRequest, Voucher, VoucherCode, VoucherId, VoucherStatus,
};
use backend::outbound::memory::{
    InMemoryPrincipals, InMemorySessions, InMemorySubscriptions, InMemoryVouchers,
};
use backend::outbound::rate_limit::InMemoryRateLimitStore;

const CONTENDERS: usize = 8;

fn seed_voucher(vouchers: &InMemoryVouchers, issuer: PrincipalId) -> VoucherId {
    let id = VoucherId::random();
    vouchers.insert(Voucher {
        id: id.clone(),
        code: VoucherCode::new("RACE-0001").expect("valid code"),
        issuer,
        price_minor: 5_000,
        limits: EntitlementLimits {
            time_limit_hours: Some(1),
            speed_limit_mbps: None,
            data_limit_gib: None,
        },
        valid_from: None,
        valid_until: None,
        status: VoucherStatus::Active,
        used_by: None,
        used_at: None,
    });
    id
}

#[actix_rt::test]
async fn conditional_write_admits_exactly_one_redeemer() {
    let vouchers = Arc::new(InMemoryVouchers::default());
    let voucher_id = seed_voucher(&vouchers, PrincipalId::random());
    let now = Utc::now();

    let attempts = (0..CONTENDERS).map(|_| {
        let vouchers = Arc::clone(&vouchers);
        let voucher_id = voucher_id.clone();
        let principal = PrincipalId::random();
        async move { vouchers.redeem(&voucher_id, &principal, now).await }
    });
    let outcomes = join_all(attempts).await;

    let winners = outcomes
        .iter()
        .filter(|outcome| {
            matches!(
                outcome.as_ref().expect("no repository failure"),
                RedemptionOutcome::Redeemed(_)
            )
        })
        .count();
    assert_eq!(winners, 1, "exactly one contender may consume the voucher");

    let stored = vouchers
        .find_by_id(&voucher_id)
        .await
        .expect("lookup")
        .expect("voucher present");
    assert_eq!(stored.status, VoucherStatus::Used);
    assert!(stored.used_by.is_some());
    assert_eq!(stored.used_at, Some(now));
}

#[actix_rt::test]
async fn concurrent_redemption_requests_yield_one_receipt_and_conflicts() {
    let principals = Arc::new(InMemoryPrincipals::default());
    let vouchers = Arc::new(InMemoryVouchers::default());
    let issuer = PrincipalId::random();
    seed_voucher(&vouchers, issuer.clone());

    let mut contenders = Vec::with_capacity(CONTENDERS);
    for n in 0..CONTENDERS {
        let id = PrincipalId::random();
        principals.insert(Principal {
            id: id.clone(),
            login: LoginIdentifier::new(format!("user{n}@example.com")).expect("valid login"),
            active: true,
            password_digest: None,
        });
        contenders.push(id);
    }

    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let service = Arc::new(AuthorizationService::new(
        AuthorizationPorts {
            principals,
            vouchers: Arc::clone(&vouchers) as Arc<dyn VoucherRepository>,
            subscriptions: Arc::new(InMemorySubscriptions::default()),
            sessions: Arc::new(InMemorySessions::default()),
            throttle: Arc::new(InMemoryRateLimitStore::new(
                Duration::from_secs(60),
                u32::MAX,
                Arc::clone(&clock),
            )),
        },
        clock,
    ));

    let attempts = contenders.into_iter().map(|principal| {
        let service = Arc::clone(&service);
        async move {
            service
                .redeem(RedemptionRequest {
                    code: "RACE-0001".to_owned(),
                    principal: Some(principal),
                    requested_at: Utc::now(),
                })
                .await
        }
    });
    let results = join_all(attempts).await;

    let receipts = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(receipts, 1, "exactly one contender receives a receipt");

    for result in results.iter().filter(|r| r.is_err()) {
        let err = result.as_ref().expect_err("checked above");
        assert_eq!(err.code(), ErrorCode::Conflict);
    }
}
