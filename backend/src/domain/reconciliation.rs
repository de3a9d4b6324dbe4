//! Payment reconciliation.
//!
//! Bridges the gap between "payment requested" and "entitlement usable" by
//! aligning internal payment state with the provider's authoritative status.
//! The worker is the exclusive writer of a payment's terminal transition and
//! is safe to invoke concurrently for the same payment: the terminal write
//! is conditional on the stored status still being pending.
//!
//! Ordering contract: a settlement is recorded on the payment first, and the
//! linked voucher is consumed second. Losing the voucher race after the
//! money was collected is surfaced as a discrepancy for manual review, never
//! rolled back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;

use crate::domain::error::DomainError;
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ports::{
    PaymentProviderError, PaymentRepository, PaymentStatusQuery, ProviderPaymentStatus,
    ProviderRegistry, RedemptionOutcome, SettlementOutcome, VoucherRepository,
};

/// Result of reconciling one payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Settled and, where linked, the voucher was consumed.
    Completed,
    /// Settled, but the linked voucher had already been consumed elsewhere.
    CompletedVoucherConflict,
    /// The provider rejected the collection; the voucher is untouched.
    Failed,
    /// Provider still pending or unreachable; retried on the next sweep.
    StillPending,
    /// A concurrent reconciliation settled the payment first.
    AlreadySettled,
}

/// Aggregate counts for one sweep over pending payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Pending payments examined.
    pub examined: usize,
    /// Payments settled successfully this sweep.
    pub completed: usize,
    /// Payments marked failed this sweep.
    pub failed: usize,
    /// Payments left pending for the next sweep.
    pub still_pending: usize,
    /// Settlements whose voucher was already consumed elsewhere.
    pub conflicts: usize,
}

/// Async sleeping abstraction so sweep-loop tests need no real timers.
#[async_trait]
pub trait SweepSleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Tokio-based sleeper implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl SweepSleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sweep interval jitter, keeping replicas from polling providers in step.
pub trait SweepJitter: Send + Sync {
    /// Return a jittered interval from the configured base interval.
    fn jittered_interval(&self, base: Duration) -> Duration;
}

/// Default jitter: up to a quarter of the base interval, uniformly random.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl SweepJitter for RandomJitter {
    fn jittered_interval(&self, base: Duration) -> Duration {
        use rand::Rng;
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let max_extra = (base_ms / 4).max(1);
        let extra = rand::thread_rng().gen_range(0..=max_extra);
        Duration::from_millis(base_ms.saturating_add(extra))
    }
}

/// Runtime helpers for the sweep loop.
pub struct ReconciliationRuntime {
    /// Async sleep implementation.
    pub sleeper: Arc<dyn SweepSleeper>,
    /// Interval jitter strategy.
    pub jitter: Arc<dyn SweepJitter>,
}

impl Default for ReconciliationRuntime {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(RandomJitter),
        }
    }
}

/// Reconciliation worker over the payment store and provider registry.
pub struct ReconciliationWorker {
    payments: Arc<dyn PaymentRepository>,
    vouchers: Arc<dyn VoucherRepository>,
    providers: ProviderRegistry,
    clock: Arc<dyn Clock>,
    runtime: ReconciliationRuntime,
}

impl ReconciliationWorker {
    /// Build a worker using default runtime dependencies.
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        vouchers: Arc<dyn VoucherRepository>,
        providers: ProviderRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_runtime(
            payments,
            vouchers,
            providers,
            clock,
            ReconciliationRuntime::default(),
        )
    }

    /// Build a worker with injected runtime abstractions.
    pub fn with_runtime(
        payments: Arc<dyn PaymentRepository>,
        vouchers: Arc<dyn VoucherRepository>,
        providers: ProviderRegistry,
        clock: Arc<dyn Clock>,
        runtime: ReconciliationRuntime,
    ) -> Self {
        Self {
            payments,
            vouchers,
            providers,
            clock,
            runtime,
        }
    }

    /// Reconcile one payment against its provider.
    pub async fn reconcile(&self, id: &PaymentId) -> Result<ReconcileOutcome, DomainError> {
        let payment = self
            .payments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("payment not found"))?;
        if payment.status.is_terminal() {
            return Ok(ReconcileOutcome::AlreadySettled);
        }

        let provider = self.providers.get(payment.method).ok_or_else(|| {
            DomainError::internal(format!(
                "no provider registered for method {}",
                payment.method
            ))
        })?;

        let status = match provider.check_status(&payment.transaction_id).await {
            Ok(status) => status,
            Err(err) => {
                // Transient by definition, including malformed responses.
                log_provider_error(&payment, &err);
                return Ok(ReconcileOutcome::StillPending);
            }
        };

        match status {
            ProviderPaymentStatus::Pending => Ok(ReconcileOutcome::StillPending),
            ProviderPaymentStatus::Failed => self.settle_failed(&payment).await,
            ProviderPaymentStatus::Successful => self.settle_completed(&payment).await,
        }
    }

    async fn settle_failed(&self, payment: &Payment) -> Result<ReconcileOutcome, DomainError> {
        match self.payments.fail(&payment.id).await? {
            SettlementOutcome::Applied(_) => {
                tracing::info!(payment = %payment.id, "payment marked failed");
                Ok(ReconcileOutcome::Failed)
            }
            SettlementOutcome::AlreadyTerminal(_) => Ok(ReconcileOutcome::AlreadySettled),
        }
    }

    async fn settle_completed(&self, payment: &Payment) -> Result<ReconcileOutcome, DomainError> {
        let now = self.clock.utc();
        let settled = match self.payments.complete(&payment.id, now).await? {
            SettlementOutcome::Applied(payment) => payment,
            SettlementOutcome::AlreadyTerminal(_) => {
                return Ok(ReconcileOutcome::AlreadySettled);
            }
        };
        tracing::info!(payment = %settled.id, "payment completed");

        let Some(voucher_id) = &settled.voucher else {
            return Ok(ReconcileOutcome::Completed);
        };
        match self
            .vouchers
            .redeem(voucher_id, &settled.principal, now)
            .await?
        {
            RedemptionOutcome::Redeemed(voucher) => {
                tracing::info!(
                    payment = %settled.id,
                    voucher = %voucher.code,
                    "voucher activated by settlement"
                );
                Ok(ReconcileOutcome::Completed)
            }
            RedemptionOutcome::RaceLost => {
                // Money was collected but the entitlement went elsewhere.
                tracing::error!(
                    payment = %settled.id,
                    voucher = %voucher_id,
                    "settlement discrepancy: voucher already consumed"
                );
                Ok(ReconcileOutcome::CompletedVoucherConflict)
            }
        }
    }

    /// Reconcile every pending payment once.
    pub async fn sweep(&self) -> Result<SweepReport, DomainError> {
        let pending = self.payments.list_pending().await?;
        let mut report = SweepReport {
            examined: pending.len(),
            ..SweepReport::default()
        };
        for payment in &pending {
            match self.reconcile(&payment.id).await {
                Ok(ReconcileOutcome::Completed) => report.completed += 1,
                Ok(ReconcileOutcome::CompletedVoucherConflict) => {
                    report.completed += 1;
                    report.conflicts += 1;
                }
                Ok(ReconcileOutcome::Failed) => report.failed += 1,
                Ok(ReconcileOutcome::StillPending) => report.still_pending += 1,
                Ok(ReconcileOutcome::AlreadySettled) => {}
                Err(err) => {
                    // Leave the payment for the next sweep.
                    tracing::warn!(payment = %payment.id, error = %err, "reconcile failed");
                    report.still_pending += 1;
                }
            }
        }
        Ok(report)
    }

    /// Run periodic sweeps until the task is dropped.
    pub async fn run(&self, interval: Duration) {
        loop {
            match self.sweep().await {
                Ok(report) => {
                    if report.examined > 0 {
                        tracing::info!(
                            examined = report.examined,
                            completed = report.completed,
                            failed = report.failed,
                            still_pending = report.still_pending,
                            conflicts = report.conflicts,
                            "reconciliation sweep finished"
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "reconciliation sweep failed");
                }
            }
            let delay = self.runtime.jitter.jittered_interval(interval);
            self.runtime.sleeper.sleep(delay).await;
        }
    }
}

fn log_provider_error(payment: &Payment, err: &PaymentProviderError) {
    match err {
        PaymentProviderError::Timeout { .. } | PaymentProviderError::Transport { .. } => {
            tracing::warn!(payment = %payment.id, error = %err, "provider unreachable");
        }
        PaymentProviderError::Decode { .. } => {
            tracing::warn!(payment = %payment.id, error = %err, "provider response malformed");
        }
        PaymentProviderError::Rejected { .. } => {
            tracing::warn!(payment = %payment.id, error = %err, "provider rejected status query");
        }
    }
}

#[async_trait]
impl PaymentStatusQuery for ReconciliationWorker {
    async fn poll(&self, id: &PaymentId) -> Result<Payment, DomainError> {
        self.reconcile(id).await?;
        self.payments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("payment not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::EntitlementLimits;
    use crate::domain::payment::{PaymentMethod, PaymentStatus};
    use crate::domain::ports::{PaymentChargeRequest, PaymentProvider};
    use crate::domain::principal::PrincipalId;
    use crate::domain::voucher::{Voucher, VoucherCode, VoucherId, VoucherStatus};
    use crate::outbound::memory::{InMemoryPayments, InMemoryVouchers};
    use chrono::{DateTime, Local, TimeZone, Utc};
    use rstest::rstest;

    struct FixtureClock {
        utc_now: DateTime<Utc>,
    }

    impl Clock for FixtureClock {
        fn local(&self) -> DateTime<Local> {
            self.utc_now.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.utc_now
        }
    }

    fn fixture_timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("ts")
    }

    struct ScriptedProvider {
        method: PaymentMethod,
        response: Result<ProviderPaymentStatus, PaymentProviderError>,
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
            Ok("txn".to_owned())
        }

        async fn check_status(
            &self,
            _transaction_id: &str,
        ) -> Result<ProviderPaymentStatus, PaymentProviderError> {
            self.response.clone()
        }
    }

    struct Fixture {
        payments: Arc<InMemoryPayments>,
        vouchers: Arc<InMemoryVouchers>,
        worker: ReconciliationWorker,
    }

    fn fixture(response: Result<ProviderPaymentStatus, PaymentProviderError>) -> Fixture {
        let payments = Arc::new(InMemoryPayments::default());
        let vouchers = Arc::new(InMemoryVouchers::default());
        let providers = ProviderRegistry::default().with(Arc::new(ScriptedProvider {
            method: PaymentMethod::MtnMomo,
            response,
        }));
        let worker = ReconciliationWorker::new(
            Arc::clone(&payments) as Arc<dyn PaymentRepository>,
            Arc::clone(&vouchers) as Arc<dyn VoucherRepository>,
            providers,
            Arc::new(FixtureClock {
                utc_now: fixture_timestamp(),
            }),
        );
        Fixture {
            payments,
            vouchers,
            worker,
        }
    }

    fn voucher() -> Voucher {
        Voucher {
            id: VoucherId::random(),
            code: VoucherCode::new("CODE-77").expect("valid code"),
            issuer: PrincipalId::random(),
            price_minor: 5_000,
            limits: EntitlementLimits::default(),
            valid_from: None,
            valid_until: None,
            status: VoucherStatus::Active,
            used_by: None,
            used_at: None,
        }
    }

    fn pending_payment(voucher: Option<VoucherId>) -> Payment {
        Payment {
            id: PaymentId::random(),
            principal: PrincipalId::random(),
            voucher,
            amount_minor: 5_000,
            currency: "UGX".to_owned(),
            method: PaymentMethod::MtnMomo,
            status: PaymentStatus::Pending,
            transaction_id: "txn-42".to_owned(),
            completed_at: None,
        }
    }

    #[actix_rt::test]
    async fn successful_settlement_completes_payment_then_consumes_voucher() {
        let fx = fixture(Ok(ProviderPaymentStatus::Successful));
        let voucher = voucher();
        fx.vouchers.insert(voucher.clone());
        let payment = pending_payment(Some(voucher.id.clone()));
        fx.payments.insert(payment.clone());

        let outcome = fx.worker.reconcile(&payment.id).await.expect("reconcile");
        assert_eq!(outcome, ReconcileOutcome::Completed);

        let stored_payment = fx
            .payments
            .find_by_id(&payment.id)
            .await
            .expect("lookup")
            .expect("payment present");
        assert_eq!(stored_payment.status, PaymentStatus::Completed);
        assert_eq!(stored_payment.completed_at, Some(fixture_timestamp()));

        let stored_voucher = fx
            .vouchers
            .find_by_id(&voucher.id)
            .await
            .expect("lookup")
            .expect("voucher present");
        assert_eq!(stored_voucher.status, VoucherStatus::Used);
        assert_eq!(stored_voucher.used_by, Some(payment.principal));
    }

    #[actix_rt::test]
    async fn provider_failure_fails_payment_and_leaves_voucher_active() {
        let fx = fixture(Ok(ProviderPaymentStatus::Failed));
        let voucher = voucher();
        fx.vouchers.insert(voucher.clone());
        let payment = pending_payment(Some(voucher.id.clone()));
        fx.payments.insert(payment.clone());

        let outcome = fx.worker.reconcile(&payment.id).await.expect("reconcile");
        assert_eq!(outcome, ReconcileOutcome::Failed);

        let stored_voucher = fx
            .vouchers
            .find_by_id(&voucher.id)
            .await
            .expect("lookup")
            .expect("voucher present");
        assert_eq!(stored_voucher.status, VoucherStatus::Active);
    }

    #[rstest]
    #[case(PaymentProviderError::timeout("deadline elapsed"))]
    #[case(PaymentProviderError::transport("connection refused"))]
    #[case(PaymentProviderError::decode("unexpected body"))]
    #[actix_rt::test]
    async fn provider_errors_are_transient(#[case] error: PaymentProviderError) {
        let fx = fixture(Err(error));
        let payment = pending_payment(None);
        fx.payments.insert(payment.clone());

        let outcome = fx.worker.reconcile(&payment.id).await.expect("reconcile");
        assert_eq!(outcome, ReconcileOutcome::StillPending);

        let stored = fx
            .payments
            .find_by_id(&payment.id)
            .await
            .expect("lookup")
            .expect("payment present");
        assert_eq!(stored.status, PaymentStatus::Pending);
    }

    #[actix_rt::test]
    async fn settled_payments_are_never_reconciled_again() {
        let fx = fixture(Ok(ProviderPaymentStatus::Failed));
        let mut payment = pending_payment(None);
        payment.status = PaymentStatus::Completed;
        payment.completed_at = Some(fixture_timestamp());
        fx.payments.insert(payment.clone());

        let outcome = fx.worker.reconcile(&payment.id).await.expect("reconcile");
        assert_eq!(outcome, ReconcileOutcome::AlreadySettled);

        let stored = fx
            .payments
            .find_by_id(&payment.id)
            .await
            .expect("lookup")
            .expect("payment present");
        assert_eq!(stored.status, PaymentStatus::Completed);
    }

    #[actix_rt::test]
    async fn lost_voucher_race_surfaces_a_discrepancy() {
        let fx = fixture(Ok(ProviderPaymentStatus::Successful));
        let mut voucher = voucher();
        let earlier_winner = PrincipalId::random();
        voucher.status = VoucherStatus::Used;
        voucher.used_by = Some(earlier_winner.clone());
        fx.vouchers.insert(voucher.clone());
        let payment = pending_payment(Some(voucher.id.clone()));
        fx.payments.insert(payment.clone());

        let outcome = fx.worker.reconcile(&payment.id).await.expect("reconcile");
        assert_eq!(outcome, ReconcileOutcome::CompletedVoucherConflict);

        // Payment stays settled; the voucher keeps its original consumer.
        let stored_payment = fx
            .payments
            .find_by_id(&payment.id)
            .await
            .expect("lookup")
            .expect("payment present");
        assert_eq!(stored_payment.status, PaymentStatus::Completed);
        let stored_voucher = fx
            .vouchers
            .find_by_id(&voucher.id)
            .await
            .expect("lookup")
            .expect("voucher present");
        assert_eq!(stored_voucher.used_by, Some(earlier_winner));
    }

    #[actix_rt::test]
    async fn sweep_aggregates_outcomes() {
        let fx = fixture(Ok(ProviderPaymentStatus::Successful));
        let first = pending_payment(None);
        let second = pending_payment(None);
        fx.payments.insert(first);
        fx.payments.insert(second);

        let report = fx.worker.sweep().await.expect("sweep");
        assert_eq!(report.examined, 2);
        assert_eq!(report.completed, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.still_pending, 0);
    }
}
