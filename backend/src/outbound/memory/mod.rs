//! In-memory adapters for every persistence port.
//!
//! Used by the no-database server mode and by tests. The conditional writes
//! mirror the relational adapters exactly: redemption and settlement check
//! their preconditions while holding the store lock, so concurrency tests
//! observe the same exactly-once behaviour as the production path.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{
    PaymentRepository, PrincipalRepository, RedemptionOutcome, RepositoryError, SessionLedger,
    SettlementOutcome, SubscriptionRepository, VoucherRepository,
};
use crate::domain::principal::{LoginIdentifier, Principal, PrincipalId};
use crate::domain::session::{AccessSession, DeviceId, SessionToken};
use crate::domain::subscription::Subscription;
use crate::domain::voucher::{Voucher, VoucherCode, VoucherId, VoucherStatus};

fn poisoned() -> RepositoryError {
    RepositoryError::connection("in-memory store lock poisoned")
}

/// Principal store keyed by id.
#[derive(Default)]
pub struct InMemoryPrincipals {
    store: Mutex<HashMap<Uuid, Principal>>,
}

impl InMemoryPrincipals {
    /// Seed a principal.
    pub fn insert(&self, principal: Principal) {
        if let Ok(mut guard) = self.store.lock() {
            guard.insert(*principal.id.as_uuid(), principal);
        }
    }
}

#[async_trait]
impl PrincipalRepository for InMemoryPrincipals {
    async fn find_by_login(
        &self,
        login: &LoginIdentifier,
    ) -> Result<Option<Principal>, RepositoryError> {
        let guard = self.store.lock().map_err(|_| poisoned())?;
        Ok(guard.values().find(|p| &p.login == login).cloned())
    }

    async fn find_by_id(&self, id: &PrincipalId) -> Result<Option<Principal>, RepositoryError> {
        let guard = self.store.lock().map_err(|_| poisoned())?;
        Ok(guard.get(id.as_uuid()).cloned())
    }

    async fn create(&self, principal: &Principal) -> Result<(), RepositoryError> {
        let mut guard = self.store.lock().map_err(|_| poisoned())?;
        if guard.values().any(|p| p.login == principal.login) {
            return Err(RepositoryError::query("duplicate login"));
        }
        guard.insert(*principal.id.as_uuid(), principal.clone());
        Ok(())
    }
}

/// Voucher store with the conditional redemption write.
#[derive(Default)]
pub struct InMemoryVouchers {
    store: Mutex<HashMap<Uuid, Voucher>>,
}

impl InMemoryVouchers {
    /// Seed a voucher.
    pub fn insert(&self, voucher: Voucher) {
        if let Ok(mut guard) = self.store.lock() {
            guard.insert(*voucher.id.as_uuid(), voucher);
        }
    }
}

#[async_trait]
impl VoucherRepository for InMemoryVouchers {
    async fn find_by_code(&self, code: &VoucherCode) -> Result<Option<Voucher>, RepositoryError> {
        let guard = self.store.lock().map_err(|_| poisoned())?;
        Ok(guard.values().find(|v| &v.code == code).cloned())
    }

    async fn find_by_id(&self, id: &VoucherId) -> Result<Option<Voucher>, RepositoryError> {
        let guard = self.store.lock().map_err(|_| poisoned())?;
        Ok(guard.get(id.as_uuid()).cloned())
    }

    async fn redeem(
        &self,
        id: &VoucherId,
        principal: &PrincipalId,
        at: DateTime<Utc>,
    ) -> Result<RedemptionOutcome, RepositoryError> {
        let mut guard = self.store.lock().map_err(|_| poisoned())?;
        let voucher = guard
            .get_mut(id.as_uuid())
            .ok_or_else(|| RepositoryError::query("voucher not found"))?;
        // Same precondition as the SQL adapter's conditional UPDATE.
        if voucher.status != VoucherStatus::Active || voucher.used_by.is_some() {
            return Ok(RedemptionOutcome::RaceLost);
        }
        voucher.status = VoucherStatus::Used;
        voucher.used_by = Some(principal.clone());
        voucher.used_at = Some(at);
        Ok(RedemptionOutcome::Redeemed(voucher.clone()))
    }

    async fn mark_expired(&self, id: &VoucherId) -> Result<bool, RepositoryError> {
        let mut guard = self.store.lock().map_err(|_| poisoned())?;
        let voucher = guard
            .get_mut(id.as_uuid())
            .ok_or_else(|| RepositoryError::query("voucher not found"))?;
        if voucher.status != VoucherStatus::Active {
            return Ok(false);
        }
        voucher.status = VoucherStatus::Expired;
        Ok(true)
    }
}

/// Subscription store keyed by id.
#[derive(Default)]
pub struct InMemorySubscriptions {
    store: Mutex<HashMap<Uuid, Subscription>>,
}

impl InMemorySubscriptions {
    /// Seed a subscription.
    pub fn insert(&self, subscription: Subscription) {
        if let Ok(mut guard) = self.store.lock() {
            guard.insert(*subscription.id.as_uuid(), subscription);
        }
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptions {
    async fn current_for_principal(
        &self,
        principal: &PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let guard = self.store.lock().map_err(|_| poisoned())?;
        Ok(guard
            .values()
            .filter(|s| &s.principal == principal && s.is_current(now))
            .max_by_key(|s| s.start_date)
            .cloned())
    }
}

/// Payment store with conditional terminal transitions.
#[derive(Default)]
pub struct InMemoryPayments {
    store: Mutex<HashMap<Uuid, Payment>>,
}

impl InMemoryPayments {
    /// Seed a payment.
    pub fn insert(&self, payment: Payment) {
        if let Ok(mut guard) = self.store.lock() {
            guard.insert(*payment.id.as_uuid(), payment);
        }
    }

    fn transition(
        &self,
        id: &PaymentId,
        apply: impl FnOnce(&mut Payment),
    ) -> Result<SettlementOutcome, RepositoryError> {
        let mut guard = self.store.lock().map_err(|_| poisoned())?;
        let payment = guard
            .get_mut(id.as_uuid())
            .ok_or_else(|| RepositoryError::query("payment not found"))?;
        if payment.status.is_terminal() {
            return Ok(SettlementOutcome::AlreadyTerminal(payment.clone()));
        }
        apply(payment);
        Ok(SettlementOutcome::Applied(payment.clone()))
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPayments {
    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let guard = self.store.lock().map_err(|_| poisoned())?;
        Ok(guard.get(id.as_uuid()).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<Payment>, RepositoryError> {
        let guard = self.store.lock().map_err(|_| poisoned())?;
        Ok(guard
            .values()
            .filter(|p| p.status == PaymentStatus::Pending)
            .cloned()
            .collect())
    }

    async fn complete(
        &self,
        id: &PaymentId,
        at: DateTime<Utc>,
    ) -> Result<SettlementOutcome, RepositoryError> {
        self.transition(id, |payment| {
            payment.status = PaymentStatus::Completed;
            payment.completed_at = Some(at);
        })
    }

    async fn fail(&self, id: &PaymentId) -> Result<SettlementOutcome, RepositoryError> {
        self.transition(id, |payment| {
            payment.status = PaymentStatus::Failed;
        })
    }
}

/// Session ledger keyed by principal + device.
#[derive(Default)]
pub struct InMemorySessions {
    store: Mutex<HashMap<(Uuid, String), AccessSession>>,
}

#[async_trait]
impl SessionLedger for InMemorySessions {
    async fn upsert(
        &self,
        principal: &PrincipalId,
        device: &DeviceId,
        expires_at: DateTime<Utc>,
    ) -> Result<AccessSession, RepositoryError> {
        let mut guard = self.store.lock().map_err(|_| poisoned())?;
        let key = (*principal.as_uuid(), device.as_str().to_owned());
        let session = guard
            .entry(key)
            .and_modify(|existing| existing.expires_at = expires_at)
            .or_insert_with(|| AccessSession {
                token: SessionToken::random(),
                principal: principal.clone(),
                device: device.clone(),
                expires_at,
            });
        Ok(session.clone())
    }

    async fn find(
        &self,
        principal: &PrincipalId,
        device: &DeviceId,
    ) -> Result<Option<AccessSession>, RepositoryError> {
        let guard = self.store.lock().map_err(|_| poisoned())?;
        let key = (*principal.as_uuid(), device.as_str().to_owned());
        Ok(guard.get(&key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[actix_rt::test]
    async fn session_upsert_keeps_the_token_and_refreshes_expiry() {
        let ledger = InMemorySessions::default();
        let principal = PrincipalId::random();
        let device = DeviceId::new("aa:bb:cc:dd:ee:ff").expect("valid device");
        let first_expiry = Utc::now();

        let first = ledger
            .upsert(&principal, &device, first_expiry)
            .await
            .expect("upsert");
        let second = ledger
            .upsert(&principal, &device, first_expiry + chrono::Duration::hours(1))
            .await
            .expect("upsert");

        assert_eq!(first.token, second.token);
        assert_eq!(second.expires_at, first_expiry + chrono::Duration::hours(1));
    }

    #[rstest]
    #[actix_rt::test]
    async fn payment_terminal_state_never_reverts() {
        let payments = InMemoryPayments::default();
        let payment = Payment {
            id: PaymentId::random(),
            principal: PrincipalId::random(),
            voucher: None,
            amount_minor: 5_000,
            currency: "UGX".to_owned(),
            method: crate::domain::payment::PaymentMethod::MtnMomo,
            status: PaymentStatus::Pending,
            transaction_id: "txn-1".to_owned(),
            completed_at: None,
        };
        payments.insert(payment.clone());
        let settled_at = Utc::now();

        let first = payments
            .complete(&payment.id, settled_at)
            .await
            .expect("complete");
        assert!(matches!(first, SettlementOutcome::Applied(_)));

        let replay = payments.fail(&payment.id).await.expect("fail attempt");
        let SettlementOutcome::AlreadyTerminal(stored) = replay else {
            panic!("expected the terminal state to stick");
        };
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.completed_at, Some(settled_at));
    }
}
