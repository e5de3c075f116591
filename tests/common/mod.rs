use chrono::NaiveDate;
use lockerbook::application::lock::UnitLockManager;
use lockerbook::application::orchestrator::{BookingOrchestrator, CompleteBooking};
use lockerbook::application::promo::PromoCodeEvaluator;
use lockerbook::application::registry::PaymentMethodRegistry;
use lockerbook::domain::booking::{Booking, LateFee, Subscription};
use lockerbook::domain::money::Money;
use lockerbook::domain::payment::PaymentMethod;
use lockerbook::domain::ports::{
    BookingStore, PromoCodeStore, SubscriptionStore, TenantStore, UnitStore,
};
use lockerbook::domain::promo::PromoCode;
use lockerbook::domain::tenant::Tenant;
use lockerbook::domain::unit::Unit;
use lockerbook::error::Result;
use lockerbook::infrastructure::gateway::SandboxGateway;
use lockerbook::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryFeePolicyStore, InMemoryPaymentMethodStore,
    InMemoryPromoCodeStore, InMemorySubscriptionStore, InMemoryTenantStore, InMemoryUnitStore,
};
use rust_decimal::Decimal;
use std::sync::Arc;

pub const MOVE_IN: &str = "2026-09-01";

/// Everything wired together on in-memory stores and the sandbox gateway.
pub struct TestWorld {
    pub units: Arc<InMemoryUnitStore>,
    pub bookings: Arc<InMemoryBookingStore>,
    pub subscriptions: Arc<InMemorySubscriptionStore>,
    pub tenants: Arc<InMemoryTenantStore>,
    pub promos: Arc<InMemoryPromoCodeStore>,
    pub fees: Arc<InMemoryFeePolicyStore>,
    pub gateway: Arc<SandboxGateway>,
    pub evaluator: PromoCodeEvaluator,
    pub registry: PaymentMethodRegistry,
    pub orchestrator: Arc<BookingOrchestrator>,
}

impl TestWorld {
    pub fn new() -> Self {
        let units = Arc::new(InMemoryUnitStore::new());
        let bookings = Arc::new(InMemoryBookingStore::new());
        let subscriptions = Arc::new(InMemorySubscriptionStore::new());
        let tenants = Arc::new(InMemoryTenantStore::new());
        let promos = Arc::new(InMemoryPromoCodeStore::new());
        let methods = Arc::new(InMemoryPaymentMethodStore::new());
        let fees = Arc::new(InMemoryFeePolicyStore::new());
        let gateway = Arc::new(SandboxGateway::new());

        let evaluator = PromoCodeEvaluator::new(promos.clone(), subscriptions.clone());
        let registry =
            PaymentMethodRegistry::new(methods.clone(), tenants.clone(), gateway.clone());
        let orchestrator = Arc::new(BookingOrchestrator::new(
            bookings.clone(),
            subscriptions.clone(),
            tenants.clone(),
            methods.clone(),
            fees.clone(),
            PromoCodeEvaluator::new(promos.clone(), subscriptions.clone()),
            UnitLockManager::new(units.clone()),
            gateway.clone(),
            None,
        ));

        Self {
            units,
            bookings,
            subscriptions,
            tenants,
            promos,
            fees,
            gateway,
            evaluator,
            registry,
            orchestrator,
        }
    }

    pub fn move_in() -> NaiveDate {
        MOVE_IN.parse().unwrap()
    }

    pub async fn seed_unit(&self, id: u32) {
        self.units.put(Unit::new(id)).await.unwrap();
    }

    pub async fn seed_tenant(&self, id: u32) {
        self.tenants
            .put(Tenant::new(id, format!("tenant{id}@example.com")))
            .await
            .unwrap();
    }

    pub async fn seed_subscription(&self, id: u32, unit: u32, rate: Decimal, months: u32) {
        self.subscriptions
            .put(Subscription::new(id, unit, Money::new(rate), months))
            .await
            .unwrap();
    }

    pub async fn seed_booking(&self, id: u32, unit: u32, tenant: u32) {
        self.bookings
            .put(Booking::new(id, unit, tenant, Self::move_in()))
            .await
            .unwrap();
    }

    pub async fn seed_promo(&self, promo: PromoCode) {
        self.promos.put(promo).await.unwrap();
    }

    pub async fn set_fee(&self, amount: Decimal) {
        self.fees
            .set(LateFee {
                amount: Money::new(amount),
                label: "late payment".to_string(),
            })
            .await;
    }

    pub async fn register(&self, tenant: u32, token: &str) -> Result<PaymentMethod> {
        self.registry.register(tenant, token).await
    }

    /// Seeds tenant + unit + subscription + booking and registers a card,
    /// returning a ready-to-send completion request.
    pub async fn seed_complete_request(
        &self,
        booking: u32,
        tenant: u32,
        unit: u32,
        subscription: u32,
        rate: Decimal,
    ) -> CompleteBooking {
        self.seed_tenant(tenant).await;
        if self.units.get(unit).await.unwrap().is_none() {
            self.seed_unit(unit).await;
        }
        self.seed_subscription(subscription, unit, rate, 1).await;
        self.seed_booking(booking, unit, tenant).await;
        let method = self
            .register(tenant, &format!("tok_card_t{tenant}b{booking}"))
            .await
            .unwrap();
        CompleteBooking {
            tenant,
            subscription,
            booking,
            promo_code: None,
            payment_method: method.id,
            repay: false,
        }
    }
}
