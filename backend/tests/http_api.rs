//! End-to-end HTTP tests over the in-memory adapters.
//!
//! These exercise the full inbound surface: decision envelope exactness,
//! uniform denial text, voucher redemption, throttling, and payment polling
//! with a scripted provider.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, test, web};
use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use serde_json::json;

use backend::domain::ports::{
    PaymentChargeRequest, PaymentProvider, PaymentProviderError, ProviderPaymentStatus,
    ProviderRegistry, VoucherRepository,
};
use backend::domain::{
    AuthorizationPorts, AuthorizationService, EntitlementLimits, LoginIdentifier, Payment,
    PaymentId, PaymentMethod, PaymentStatus, Principal, PrincipalId, ReconciliationWorker,
    Voucher, VoucherCode, VoucherId, VoucherStatus,
};
use backend::inbound::http::HttpState;
use backend::inbound::http::authorize::{authorize, authorize_check};
use backend::inbound::http::payments::payment_status;
use backend::inbound::http::vouchers::redeem;
use backend::outbound::memory::{
    InMemoryPayments, InMemoryPrincipals, InMemorySessions, InMemorySubscriptions,
    InMemoryVouchers,
};
use backend::outbound::rate_limit::InMemoryRateLimitStore;

const VOUCHER_CODE: &str = "CODE-000042";

struct Fixtures {
    principals: Arc<InMemoryPrincipals>,
    vouchers: Arc<InMemoryVouchers>,
    subscriptions: Arc<InMemorySubscriptions>,
    payments: Arc<InMemoryPayments>,
    issuer: PrincipalId,
}

impl Fixtures {
    fn new() -> Self {
        let principals = Arc::new(InMemoryPrincipals::default());
        let issuer = PrincipalId::random();
        principals.insert(Principal {
            id: issuer.clone(),
            login: LoginIdentifier::new("issuer@example.com").expect("valid login"),
            active: true,
            password_digest: None,
        });
        Self {
            principals,
            vouchers: Arc::new(InMemoryVouchers::default()),
            subscriptions: Arc::new(InMemorySubscriptions::default()),
            payments: Arc::new(InMemoryPayments::default()),
            issuer,
        }
    }

    fn seed_voucher(&self, code: &str) -> VoucherId {
        let id = VoucherId::random();
        self.vouchers.insert(Voucher {
            id: id.clone(),
            code: VoucherCode::new(code).expect("valid code"),
            issuer: self.issuer.clone(),
            price_minor: 5_000,
            limits: EntitlementLimits {
                time_limit_hours: Some(6),
                speed_limit_mbps: Some(4),
                data_limit_gib: Some(2),
            },
            valid_from: None,
            valid_until: None,
            status: VoucherStatus::Active,
            used_by: None,
            used_at: None,
        });
        id
    }

    fn state(&self, providers: ProviderRegistry, max_attempts: u32) -> web::Data<HttpState> {
        let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
        let throttle = Arc::new(InMemoryRateLimitStore::new(
            Duration::from_secs(60),
            max_attempts,
            Arc::clone(&clock),
        ));
        let service = Arc::new(AuthorizationService::new(
            AuthorizationPorts {
                principals: self.principals.clone(),
                vouchers: self.vouchers.clone(),
                subscriptions: self.subscriptions.clone(),
                sessions: Arc::new(InMemorySessions::default()),
                throttle,
            },
            Arc::clone(&clock),
        ));
        let worker = Arc::new(ReconciliationWorker::new(
            self.payments.clone(),
            self.vouchers.clone(),
            providers,
            clock,
        ));
        web::Data::new(HttpState::new(service.clone(), service, worker))
    }
}

macro_rules! spawn_app {
    ($state:expr) => {
        test::init_service(
            App::new().app_data($state).service(
                web::scope("/api/v1")
                    .service(authorize)
                    .service(authorize_check)
                    .service(redeem)
                    .service(payment_status),
            ),
        )
        .await
    };
}

fn authorize_body(username: &str) -> serde_json::Value {
    json!({
        "username": username,
        "mac": "AA:BB:CC:DD:EE:FF",
        "nas_id": "ap-01",
        "nas_ip": "10.0.0.2",
        "calling_station_id": "AA-BB-CC-DD-EE-FF",
    })
}

#[actix_rt::test]
async fn unknown_credentials_get_the_exact_denial_envelope() {
    let fixtures = Fixtures::new();
    let app = spawn_app!(fixtures.state(ProviderRegistry::default(), 10));

    let req = test::TestRequest::post()
        .uri("/api/v1/authorize")
        .set_json(authorize_body("nobody@example.com"))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body, json!({ "status": "DENY", "message": "Access denied" }));
}

#[actix_rt::test]
async fn voucher_code_grant_carries_converted_limits() {
    let fixtures = Fixtures::new();
    let voucher_id = fixtures.seed_voucher(VOUCHER_CODE);
    let app = spawn_app!(fixtures.state(ProviderRegistry::default(), 10));

    let req = test::TestRequest::post()
        .uri("/api/v1/authorize")
        .set_json(authorize_body(VOUCHER_CODE))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["session_time"], 21_600);
    assert_eq!(body["download_limit"], 500_000);
    assert_eq!(body["upload_limit"], 500_000);
    assert_eq!(body["data_limit"], 2_147_483_648_u64);
    assert!(body["session_id"].is_string());
    assert!(body["user_id"].is_string());

    let stored = fixtures
        .vouchers
        .find_by_id(&voucher_id)
        .await
        .expect("lookup")
        .expect("voucher present");
    assert_eq!(stored.status, VoucherStatus::Used);
}

#[actix_rt::test]
async fn check_reports_status_without_consuming_the_voucher() {
    let fixtures = Fixtures::new();
    let voucher_id = fixtures.seed_voucher(VOUCHER_CODE);
    let app = spawn_app!(fixtures.state(ProviderRegistry::default(), 10));

    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/api/v1/authorize/check")
            .set_json(authorize_body(VOUCHER_CODE))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), 200);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body, json!({ "status": "OK", "message": "Access granted" }));
    }

    let stored = fixtures
        .vouchers
        .find_by_id(&voucher_id)
        .await
        .expect("lookup")
        .expect("voucher present");
    assert_eq!(stored.status, VoucherStatus::Active, "check must not redeem");
}

#[actix_rt::test]
async fn attempts_beyond_the_window_budget_are_denied() {
    let fixtures = Fixtures::new();
    fixtures.seed_voucher(VOUCHER_CODE);
    let app = spawn_app!(fixtures.state(ProviderRegistry::default(), 1));

    let first = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/authorize")
            .set_json(authorize_body(VOUCHER_CODE))
            .to_request(),
    )
    .await;
    let body: serde_json::Value = test::read_body_json(first).await;
    assert_eq!(body["status"], "OK");

    let second = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/authorize")
            .set_json(authorize_body(VOUCHER_CODE))
            .to_request(),
    )
    .await;
    assert_eq!(second.status(), 200);
    let body: serde_json::Value = test::read_body_json(second).await;
    assert_eq!(body, json!({ "status": "DENY", "message": "Access denied" }));
}

#[actix_rt::test]
async fn malformed_mac_is_rejected_with_invalid_request() {
    let fixtures = Fixtures::new();
    let app = spawn_app!(fixtures.state(ProviderRegistry::default(), 10));

    let mut body = authorize_body("nobody@example.com");
    body["mac"] = json!(" :: ");
    let req = test::TestRequest::post()
        .uri("/api/v1/authorize")
        .set_json(body)
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), 400);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "invalid_request");
}

#[actix_rt::test]
async fn redemption_synthesises_a_principal_and_replays_idempotently() {
    let fixtures = Fixtures::new();
    fixtures.seed_voucher(VOUCHER_CODE);
    let app = spawn_app!(fixtures.state(ProviderRegistry::default(), 10));

    let first = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/vouchers/redeem")
            .set_json(json!({ "code": VOUCHER_CODE }))
            .to_request(),
    )
    .await;
    assert_eq!(first.status(), 200);
    let first_body: serde_json::Value = test::read_body_json(first).await;
    assert_eq!(first_body["status"], "USED");
    let bound_principal = first_body["principalId"].clone();

    let replay = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/vouchers/redeem")
            .set_json(json!({ "code": VOUCHER_CODE }))
            .to_request(),
    )
    .await;
    assert_eq!(replay.status(), 200);
    let replay_body: serde_json::Value = test::read_body_json(replay).await;
    assert_eq!(replay_body["principalId"], bound_principal);

    let other = uuid::Uuid::new_v4();
    let conflict = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/v1/vouchers/redeem")
            .set_json(json!({ "code": VOUCHER_CODE, "principalId": other }))
            .to_request(),
    )
    .await;
    assert_eq!(conflict.status(), 409);
}

struct ScriptedProvider {
    method: PaymentMethod,
    status: ProviderPaymentStatus,
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    fn method(&self) -> PaymentMethod {
        self.method
    }

    async fn request_payment(
        &self,
        _charge: &PaymentChargeRequest,
    ) -> Result<String, PaymentProviderError> {
        Ok("txn-scripted".to_owned())
    }

    async fn check_status(
        &self,
        _transaction_id: &str,
    ) -> Result<ProviderPaymentStatus, PaymentProviderError> {
        Ok(self.status)
    }
}

#[actix_rt::test]
async fn payment_poll_settles_and_activates_the_linked_voucher() {
    let fixtures = Fixtures::new();
    let voucher_id = fixtures.seed_voucher(VOUCHER_CODE);
    let payer = PrincipalId::random();
    let payment_id = PaymentId::random();
    fixtures.payments.insert(Payment {
        id: payment_id.clone(),
        principal: payer.clone(),
        voucher: Some(voucher_id.clone()),
        amount_minor: 5_000,
        currency: "UGX".to_owned(),
        method: PaymentMethod::MtnMomo,
        status: PaymentStatus::Pending,
        transaction_id: "txn-1".to_owned(),
        completed_at: None,
    });

    let providers = ProviderRegistry::default().with(Arc::new(ScriptedProvider {
        method: PaymentMethod::MtnMomo,
        status: ProviderPaymentStatus::Successful,
    }));
    let app = spawn_app!(fixtures.state(providers, 10));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/payments/{}", payment_id.as_uuid()))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), 200);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["status"], "COMPLETED");
    assert!(body["completedAt"].is_string());

    let voucher = fixtures
        .vouchers
        .find_by_id(&voucher_id)
        .await
        .expect("lookup")
        .expect("voucher present");
    assert_eq!(voucher.status, VoucherStatus::Used);
    assert_eq!(voucher.used_by, Some(payer));
}

#[actix_rt::test]
async fn unknown_payment_poll_is_not_found() {
    let fixtures = Fixtures::new();
    let app = spawn_app!(fixtures.state(ProviderRegistry::default(), 10));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/payments/{}", uuid::Uuid::new_v4()))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), 404);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["code"], "not_found");
}
