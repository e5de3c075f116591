use crate::domain::booking::{Booking, LateFee, Subscription};
use crate::domain::money::Money;
use crate::domain::payment::{InstrumentProfile, PaymentMethod};
use crate::domain::promo::PromoCode;
use crate::domain::tenant::Tenant;
use crate::domain::unit::{LockOutcome, Unit};
use crate::domain::{BookingId, PaymentMethodId, PromoCodeId, SubscriptionId, TenantId, UnitId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub type BookingStoreRef = Arc<dyn BookingStore>;
pub type FeePolicyStoreRef = Arc<dyn FeePolicyStore>;
pub type GatewayRef = Arc<dyn PaymentGateway>;
pub type NotifierRef = Arc<dyn Notifier>;
pub type PaymentMethodStoreRef = Arc<dyn PaymentMethodStore>;
pub type PromoCodeStoreRef = Arc<dyn PromoCodeStore>;
pub type SubscriptionStoreRef = Arc<dyn SubscriptionStore>;
pub type TenantStoreRef = Arc<dyn TenantStore>;
pub type UnitStoreRef = Arc<dyn UnitStore>;

/// Inventory store. The unit lock is the sole shared mutable resource in the
/// core, so the conditional operations below must be atomic against the
/// backing store: one compare-and-swap on `locked_by`, never a read followed
/// by a separate write.
#[async_trait]
pub trait UnitStore: Send + Sync {
    async fn get(&self, unit_id: UnitId) -> Result<Option<Unit>>;
    async fn put(&self, unit: Unit) -> Result<()>;
    async fn all(&self) -> Result<Vec<Unit>>;

    /// Atomically: if the unit is unlocked, or already locked by `booking`,
    /// set `locked_by = booking` / `locked_at = at` and report `Acquired`;
    /// if locked by someone else, change nothing and report who holds it.
    async fn lock_if_free(
        &self,
        unit_id: UnitId,
        booking: BookingId,
        at: DateTime<Utc>,
    ) -> Result<LockOutcome>;

    /// Atomically clears the lock, but only if `booking` currently holds it.
    /// A stale caller releasing someone else's lock is a silent no-op.
    async fn unlock_if_held(&self, unit_id: UnitId, booking: BookingId) -> Result<()>;

    /// Atomically transitions Locked -> Booked for the holding booking.
    async fn mark_booked(&self, unit_id: UnitId, booking: BookingId) -> Result<()>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>>;
    async fn put(&self, booking: Booking) -> Result<()>;
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get(&self, subscription_id: SubscriptionId) -> Result<Option<Subscription>>;
    async fn put(&self, subscription: Subscription) -> Result<()>;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get(&self, tenant_id: TenantId) -> Result<Option<Tenant>>;
    async fn put(&self, tenant: Tenant) -> Result<()>;
}

#[async_trait]
pub trait PromoCodeStore: Send + Sync {
    async fn get(&self, promo_id: PromoCodeId) -> Result<Option<PromoCode>>;
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCode>>;
    async fn put(&self, promo: PromoCode) -> Result<()>;
}

/// Fields of a payment method the registry supplies; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewPaymentMethod {
    pub tenant: TenantId,
    pub profile: InstrumentProfile,
    pub external_ref: String,
}

#[async_trait]
pub trait PaymentMethodStore: Send + Sync {
    async fn get(&self, method_id: PaymentMethodId) -> Result<Option<PaymentMethod>>;
    async fn find_by_fingerprint(
        &self,
        tenant: TenantId,
        fingerprint: &str,
    ) -> Result<Option<PaymentMethod>>;
    async fn insert(&self, method: NewPaymentMethod) -> Result<PaymentMethod>;
}

#[async_trait]
pub trait FeePolicyStore: Send + Sync {
    /// The single active late-fee policy, if one is configured.
    async fn active_fee(&self) -> Result<Option<LateFee>>;
}

#[derive(Debug, PartialEq, Clone)]
pub struct ChargeReceipt {
    pub charge_ref: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct RefundReceipt {
    pub refund_ref: String,
}

/// Seam to the external payment/charge service.
///
/// Implemented elsewhere; the core only relies on the idempotency contract:
/// charge attempts carrying the same `idempotency_key` coalesce to at most
/// one posted charge, and `force_retry` re-executes a previously *failed*
/// attempt under the same key without ever duplicating a success.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Exchanges an opaque instrument token for its fingerprint and
    /// descriptive metadata. No registration happens yet.
    async fn inspect_instrument(&self, token: &str) -> Result<InstrumentProfile>;

    /// Creates or reuses the tenant's gateway-side customer record and
    /// returns its reference.
    async fn ensure_customer(&self, tenant: &Tenant) -> Result<String>;

    /// Registers the instrument under the customer. A decline surfaces as
    /// `InstrumentRejected` and must not be retried automatically.
    async fn attach_instrument(&self, customer_ref: &str, token: &str) -> Result<String>;

    async fn charge(
        &self,
        customer_ref: &str,
        instrument_ref: &str,
        amount: Money,
        idempotency_key: &str,
        force_retry: bool,
    ) -> Result<ChargeReceipt>;

    async fn refund(&self, charge_ref: &str) -> Result<RefundReceipt>;
}

/// Fire-and-forget confirmation delivery. Failures are logged by the caller
/// and never affect the booking outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(&self, booking: &Booking, tenant: &Tenant) -> Result<()>;
}
