use crate::domain::booking::{Booking, LateFee, Subscription};
use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{
    BookingStore, FeePolicyStore, NewPaymentMethod, PaymentMethodStore, PromoCodeStore,
    SubscriptionStore, TenantStore, UnitStore,
};
use crate::domain::promo::PromoCode;
use crate::domain::tenant::Tenant;
use crate::domain::unit::{LockOutcome, Unit, UnitStatus};
use crate::domain::{BookingId, PaymentMethodId, PromoCodeId, SubscriptionId, TenantId, UnitId};
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory inventory store.
///
/// The conditional lock operations run entirely inside one write-guard
/// critical section, which is this store's version of the single atomic
/// compare-and-swap the `UnitStore` contract requires.
#[derive(Default, Clone)]
pub struct InMemoryUnitStore {
    units: Arc<RwLock<HashMap<UnitId, Unit>>>,
}

impl InMemoryUnitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UnitStore for InMemoryUnitStore {
    async fn get(&self, unit_id: UnitId) -> Result<Option<Unit>> {
        let units = self.units.read().await;
        Ok(units.get(&unit_id).cloned())
    }

    async fn put(&self, unit: Unit) -> Result<()> {
        let mut units = self.units.write().await;
        units.insert(unit.id, unit);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Unit>> {
        let units = self.units.read().await;
        let mut all: Vec<Unit> = units.values().cloned().collect();
        all.sort_by_key(|u| u.id);
        Ok(all)
    }

    async fn lock_if_free(
        &self,
        unit_id: UnitId,
        booking: BookingId,
        at: DateTime<Utc>,
    ) -> Result<LockOutcome> {
        let mut units = self.units.write().await;
        let unit = units
            .get_mut(&unit_id)
            .ok_or_else(|| BookingError::NotFound(format!("unit {unit_id}")))?;
        // A booked unit is never re-lockable, not even by its owner.
        if unit.status == UnitStatus::Booked {
            return Ok(LockOutcome::AlreadyLocked {
                by: unit.booked_by.unwrap_or(booking),
            });
        }
        match unit.locked_by {
            Some(holder) if holder != booking => Ok(LockOutcome::AlreadyLocked { by: holder }),
            _ => {
                unit.lock(booking, at);
                Ok(LockOutcome::Acquired)
            }
        }
    }

    async fn unlock_if_held(&self, unit_id: UnitId, booking: BookingId) -> Result<()> {
        let mut units = self.units.write().await;
        let unit = units
            .get_mut(&unit_id)
            .ok_or_else(|| BookingError::NotFound(format!("unit {unit_id}")))?;
        if unit.is_locked_by(booking) {
            unit.unlock();
        }
        Ok(())
    }

    async fn mark_booked(&self, unit_id: UnitId, booking: BookingId) -> Result<()> {
        let mut units = self.units.write().await;
        let unit = units
            .get_mut(&unit_id)
            .ok_or_else(|| BookingError::NotFound(format!("unit {unit_id}")))?;
        if !unit.is_locked_by(booking) {
            return Err(BookingError::Conflict(format!(
                "unit {unit_id} is not locked by booking {booking}"
            )));
        }
        unit.book();
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(&booking_id).cloned())
    }

    async fn put(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        bookings.insert(booking.id, booking);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<HashMap<SubscriptionId, Subscription>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get(&self, subscription_id: SubscriptionId) -> Result<Option<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.get(&subscription_id).cloned())
    }

    async fn put(&self, subscription: Subscription) -> Result<()> {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.insert(subscription.id, subscription);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryTenantStore {
    tenants: Arc<RwLock<HashMap<TenantId, Tenant>>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn get(&self, tenant_id: TenantId) -> Result<Option<Tenant>> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(&tenant_id).cloned())
    }

    async fn put(&self, tenant: Tenant) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        tenants.insert(tenant.id, tenant);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPromoCodeStore {
    promos: Arc<RwLock<HashMap<PromoCodeId, PromoCode>>>,
}

impl InMemoryPromoCodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromoCodeStore for InMemoryPromoCodeStore {
    async fn get(&self, promo_id: PromoCodeId) -> Result<Option<PromoCode>> {
        let promos = self.promos.read().await;
        Ok(promos.get(&promo_id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>> {
        let promos = self.promos.read().await;
        Ok(promos.values().find(|p| p.code == code).cloned())
    }

    async fn put(&self, promo: PromoCode) -> Result<()> {
        let mut promos = self.promos.write().await;
        promos.insert(promo.id, promo);
        Ok(())
    }
}

/// In-memory payment method store; assigns ids from a process-local counter.
#[derive(Default, Clone)]
pub struct InMemoryPaymentMethodStore {
    methods: Arc<RwLock<HashMap<PaymentMethodId, PaymentMethod>>>,
    next_id: Arc<AtomicU32>,
}

impl InMemoryPaymentMethodStore {
    pub fn new() -> Self {
        Self {
            methods: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU32::new(1)),
        }
    }
}

#[async_trait]
impl PaymentMethodStore for InMemoryPaymentMethodStore {
    async fn get(&self, method_id: PaymentMethodId) -> Result<Option<PaymentMethod>> {
        let methods = self.methods.read().await;
        Ok(methods.get(&method_id).cloned())
    }

    async fn find_by_fingerprint(
        &self,
        tenant: TenantId,
        fingerprint: &str,
    ) -> Result<Option<PaymentMethod>> {
        let methods = self.methods.read().await;
        Ok(methods
            .values()
            .find(|m| m.tenant == tenant && m.fingerprint == fingerprint)
            .cloned())
    }

    async fn insert(&self, new: NewPaymentMethod) -> Result<PaymentMethod> {
        let mut methods = self.methods.write().await;
        let method = PaymentMethod {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            tenant: new.tenant,
            kind: new.profile.kind,
            fingerprint: new.profile.fingerprint,
            external_ref: new.external_ref,
            last4: new.profile.last4,
            expiry: new.profile.expiry,
        };
        methods.insert(method.id, method.clone());
        Ok(method)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryFeePolicyStore {
    fee: Arc<RwLock<Option<LateFee>>>,
}

impl InMemoryFeePolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, fee: LateFee) {
        let mut slot = self.fee.write().await;
        *slot = Some(fee);
    }
}

#[async_trait]
impl FeePolicyStore for InMemoryFeePolicyStore {
    async fn active_fee(&self) -> Result<Option<LateFee>> {
        let fee = self.fee.read().await;
        Ok(fee.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use crate::domain::payment::{InstrumentKind, InstrumentProfile};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_unit_store_lock_if_free() {
        let store = InMemoryUnitStore::new();
        store.put(Unit::new(1)).await.unwrap();

        let outcome = store.lock_if_free(1, 10, Utc::now()).await.unwrap();
        assert_eq!(outcome, LockOutcome::Acquired);

        let outcome = store.lock_if_free(1, 11, Utc::now()).await.unwrap();
        assert_eq!(outcome, LockOutcome::AlreadyLocked { by: 10 });

        // Re-entry by the holder stays Acquired.
        let outcome = store.lock_if_free(1, 10, Utc::now()).await.unwrap();
        assert_eq!(outcome, LockOutcome::Acquired);
    }

    #[tokio::test]
    async fn test_unit_store_lock_missing_unit() {
        let store = InMemoryUnitStore::new();
        let err = store.lock_if_free(99, 10, Utc::now()).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unit_store_unlock_only_for_holder() {
        let store = InMemoryUnitStore::new();
        store.put(Unit::new(1)).await.unwrap();
        store.lock_if_free(1, 10, Utc::now()).await.unwrap();

        store.unlock_if_held(1, 11).await.unwrap();
        let unit = store.get(1).await.unwrap().unwrap();
        assert!(unit.is_locked_by(10));

        store.unlock_if_held(1, 10).await.unwrap();
        let unit = store.get(1).await.unwrap().unwrap();
        assert_eq!(unit.status, UnitStatus::Available);
    }

    #[tokio::test]
    async fn test_unit_store_booked_is_not_relockable() {
        let store = InMemoryUnitStore::new();
        store.put(Unit::new(1)).await.unwrap();
        store.lock_if_free(1, 10, Utc::now()).await.unwrap();
        store.mark_booked(1, 10).await.unwrap();

        let outcome = store.lock_if_free(1, 10, Utc::now()).await.unwrap();
        assert!(matches!(outcome, LockOutcome::AlreadyLocked { .. }));
    }

    #[tokio::test]
    async fn test_mark_booked_requires_holder() {
        let store = InMemoryUnitStore::new();
        store.put(Unit::new(1)).await.unwrap();
        store.lock_if_free(1, 10, Utc::now()).await.unwrap();

        let err = store.mark_booked(1, 11).await.unwrap_err();
        assert!(matches!(err, BookingError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_payment_method_store_assigns_ids() {
        let store = InMemoryPaymentMethodStore::new();
        let new = NewPaymentMethod {
            tenant: 1,
            profile: InstrumentProfile {
                kind: InstrumentKind::Card,
                fingerprint: "fp_abc".into(),
                last4: "4242".into(),
                expiry: None,
            },
            external_ref: "src_1".into(),
        };
        let first = store.insert(new.clone()).await.unwrap();
        let second = store.insert(new).await.unwrap();
        assert_ne!(first.id, second.id);

        let found = store.find_by_fingerprint(1, "fp_abc").await.unwrap();
        assert!(found.is_some());
        assert!(store.find_by_fingerprint(2, "fp_abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fee_policy_store() {
        let store = InMemoryFeePolicyStore::new();
        assert!(store.active_fee().await.unwrap().is_none());
        store
            .set(LateFee {
                amount: Money::new(dec!(25.00)),
                label: "late payment".into(),
            })
            .await;
        assert_eq!(
            store.active_fee().await.unwrap().unwrap().amount,
            Money::new(dec!(25.00))
        );
    }
}
