use crate::application::lock::UnitLockManager;
use crate::application::promo::PromoCodeEvaluator;
use crate::domain::booking::BookingState;
use crate::domain::money::Money;
use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{
    BookingStore, BookingStoreRef, ChargeReceipt, FeePolicyStore, FeePolicyStoreRef, GatewayRef,
    Notifier, NotifierRef, PaymentGateway, PaymentMethodStore, PaymentMethodStoreRef,
    RefundReceipt, SubscriptionStore, SubscriptionStoreRef, TenantStore, TenantStoreRef,
};
use crate::domain::tenant::Tenant;
use crate::domain::unit::{LockOutcome, UnitStatus};
use crate::domain::{BookingId, PaymentMethodId, PromoCodeId, SubscriptionId, TenantId};
use crate::error::{BookingError, Result};
use chrono::Utc;
use tracing::{info, warn};

/// Parameters of a booking-completion request, as the surrounding CRUD layer
/// hands them over. All ids are opaque references; `repay` signals an
/// intentional re-attempt of a previously failed charge for this booking.
#[derive(Debug, Clone)]
pub struct CompleteBooking {
    pub tenant: TenantId,
    pub subscription: SubscriptionId,
    pub booking: BookingId,
    pub promo_code: Option<PromoCodeId>,
    pub payment_method: PaymentMethodId,
    pub repay: bool,
}

/// Success payload of a completed booking.
#[derive(Debug, PartialEq, Clone)]
pub struct BookingReceipt {
    pub booking: BookingId,
    pub charge_ref: String,
    pub total: Money,
    pub discount: Money,
    pub charged: Money,
}

/// Composes the lock manager, promo evaluator and gateway into the
/// end-to-end "complete booking" transaction, plus the late-fee, refund and
/// abandon side operations.
pub struct BookingOrchestrator {
    bookings: BookingStoreRef,
    subscriptions: SubscriptionStoreRef,
    tenants: TenantStoreRef,
    methods: PaymentMethodStoreRef,
    fees: FeePolicyStoreRef,
    promo: PromoCodeEvaluator,
    locks: UnitLockManager,
    gateway: GatewayRef,
    notifier: Option<NotifierRef>,
}

impl BookingOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bookings: BookingStoreRef,
        subscriptions: SubscriptionStoreRef,
        tenants: TenantStoreRef,
        methods: PaymentMethodStoreRef,
        fees: FeePolicyStoreRef,
        promo: PromoCodeEvaluator,
        locks: UnitLockManager,
        gateway: GatewayRef,
        notifier: Option<NotifierRef>,
    ) -> Self {
        Self {
            bookings,
            subscriptions,
            tenants,
            methods,
            fees,
            promo,
            locks,
            gateway,
            notifier,
        }
    }

    pub fn locks(&self) -> &UnitLockManager {
        &self.locks
    }

    /// Runs the booking-completion transaction:
    /// lock unit -> validate promo -> charge -> finalize.
    ///
    /// Failure semantics per step:
    /// - missing references: `NotFound`, nothing touched;
    /// - lock contention: `Conflict`, surfaced verbatim, no compensation;
    /// - promo rejection: lock released, then surfaced;
    /// - charge failure: the lock is deliberately retained so a
    ///   `repay = true` call can resume under the same idempotency key
    ///   without reopening the race window.
    pub async fn complete_booking(&self, req: CompleteBooking) -> Result<BookingReceipt> {
        let mut booking = self
            .bookings
            .get(req.booking)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", req.booking)))?;
        // Abandoned is terminal; the unit was given back and a fresh attempt
        // needs a fresh booking.
        if booking.state == BookingState::Abandoned {
            return Err(BookingError::Conflict(format!(
                "booking {} was abandoned",
                booking.id
            )));
        }
        let mut subscription = self
            .subscriptions
            .get(req.subscription)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("subscription {}", req.subscription)))?;
        let tenant = self
            .tenants
            .get(req.tenant)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("tenant {}", req.tenant)))?;
        let method = self
            .methods
            .get(req.payment_method)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!("payment method {}", req.payment_method))
            })?;

        if method.tenant != tenant.id {
            return Err(BookingError::Validation(format!(
                "payment method {} does not belong to tenant {}",
                method.id, tenant.id
            )));
        }
        if subscription.is_payed {
            return Err(BookingError::Conflict(format!(
                "subscription {} already paid",
                subscription.id
            )));
        }

        let unit = self
            .locks
            .unit(booking.unit)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("unit {}", booking.unit)))?;
        if unit.status != UnitStatus::Available && !unit.is_locked_by(booking.id) {
            return Err(BookingError::Conflict(format!(
                "unit {} unavailable",
                unit.id
            )));
        }

        match self.locks.try_lock(unit.id, booking.id, Utc::now()).await? {
            LockOutcome::Acquired => {}
            LockOutcome::AlreadyLocked { by } => {
                return Err(BookingError::Conflict(format!(
                    "unit {} already locked by booking {by}",
                    unit.id
                )));
            }
        }

        let discount = match req.promo_code {
            Some(promo_id) => {
                match self.validate_promo(&booking, promo_id, req.subscription).await {
                    Ok(discount) => {
                        booking.promo_code = Some(promo_id);
                        discount
                    }
                    Err(err) => {
                        // A promo error must not leave the unit locked.
                        self.locks.unlock(unit.id, booking.id).await?;
                        return Err(err);
                    }
                }
            }
            None => Money::ZERO,
        };

        booking.state = BookingState::Locked;
        booking.subscription = Some(subscription.id);
        booking.payment = Some(method.id);
        self.bookings.put(booking.clone()).await?;

        let total = subscription.chargeable_total();
        let charged = total.saturating_sub(discount);
        let customer_ref = gateway_customer(&tenant)?;
        let idempotency_key = format!("booking-{}", booking.id);

        let receipt = match self
            .gateway
            .charge(
                &customer_ref,
                &method.external_ref,
                charged,
                &idempotency_key,
                req.repay,
            )
            .await
        {
            Ok(receipt) => receipt,
            Err(err) => {
                // Lock retained on purpose; the expiry sweep or an explicit
                // abandon reclaims the unit if the caller never returns.
                warn!(
                    booking = booking.id,
                    unit = unit.id,
                    error = %err,
                    "charge failed, unit stays locked for repay"
                );
                return Err(err);
            }
        };

        subscription.mark_paid(receipt.charge_ref.clone())?;
        self.subscriptions.put(subscription).await?;
        self.locks.mark_booked(unit.id, booking.id).await?;
        booking.state = BookingState::Finalized;
        self.bookings.put(booking.clone()).await?;

        info!(
            booking = booking.id,
            unit = unit.id,
            charge_ref = %receipt.charge_ref,
            %charged,
            "booking finalized"
        );

        if let Some(notifier) = &self.notifier
            && let Err(err) = notifier.booking_confirmed(&booking, &tenant).await
        {
            warn!(booking = booking.id, error = %err, "confirmation notification failed");
        }

        Ok(BookingReceipt {
            booking: booking.id,
            charge_ref: receipt.charge_ref,
            total,
            discount,
            charged,
        })
    }

    async fn validate_promo(
        &self,
        booking: &crate::domain::booking::Booking,
        promo_id: PromoCodeId,
        subscription: SubscriptionId,
    ) -> Result<Money> {
        // A booking carries at most one promo code, immutably. Re-attaching
        // the same code on a repay is fine; switching codes is not.
        if let Some(attached) = booking.promo_code
            && attached != promo_id
        {
            return Err(BookingError::NotApplicable(format!(
                "booking {} already carries promo {attached}",
                booking.id
            )));
        }
        let quote = self
            .promo
            .quote_by_id(promo_id, subscription, booking.move_in_date)
            .await?;
        Ok(quote.discount)
    }

    /// Charges the configured late fee against the booking's stored payment
    /// method. Reported by charge status only; no Booking/Unit transition.
    pub async fn apply_fee(&self, booking_id: BookingId) -> Result<ChargeReceipt> {
        let fee = self
            .fees
            .active_fee()
            .await?
            .ok_or_else(|| BookingError::NotFound("late fee policy".to_string()))?;
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
        let method_id = booking.payment.ok_or_else(|| {
            BookingError::NotPayable(format!("booking {booking_id} has no payment method"))
        })?;
        let method = self.method(method_id).await?;
        let tenant = self
            .tenants
            .get(booking.tenant)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("tenant {}", booking.tenant)))?;
        let customer_ref = gateway_customer(&tenant)?;

        // One fee per booking per day; retries within the day coalesce.
        let idempotency_key = format!("latefee-{booking_id}-{}", Utc::now().date_naive());
        let receipt = self
            .gateway
            .charge(
                &customer_ref,
                &method.external_ref,
                fee.amount,
                &idempotency_key,
                false,
            )
            .await?;
        info!(booking = booking_id, amount = %fee.amount, label = %fee.label, "late fee charged");
        Ok(receipt)
    }

    /// Refunds the subscription charge. The paid flag and the unit stay as
    /// they are; only the refund reference is recorded.
    pub async fn refund(&self, booking_id: BookingId) -> Result<RefundReceipt> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
        let subscription_id = booking.subscription.ok_or_else(|| {
            BookingError::NotPayable(format!("booking {booking_id} has no subscription"))
        })?;
        let mut subscription = self
            .subscriptions
            .get(subscription_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("subscription {subscription_id}")))?;
        let charge_ref = match (&subscription.charge_ref, subscription.is_payed) {
            (Some(charge_ref), true) => charge_ref.clone(),
            _ => {
                return Err(BookingError::NotPayable(format!(
                    "subscription {subscription_id} was never charged"
                )));
            }
        };

        let receipt = self.gateway.refund(&charge_ref).await?;
        subscription.refund_ref = Some(receipt.refund_ref.clone());
        self.subscriptions.put(subscription).await?;
        info!(booking = booking_id, refund_ref = %receipt.refund_ref, "charge refunded");
        Ok(receipt)
    }

    /// Explicitly gives up on a booking: releases the unit lock if this
    /// booking holds it and marks the booking abandoned. Not available once
    /// the subscription has been paid.
    pub async fn abandon(&self, booking_id: BookingId) -> Result<()> {
        let mut booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;

        if let Some(subscription_id) = booking.subscription
            && let Some(subscription) = self.subscriptions.get(subscription_id).await?
            && subscription.is_payed
        {
            return Err(BookingError::Conflict(format!(
                "booking {booking_id} is already finalized"
            )));
        }

        self.locks.unlock(booking.unit, booking.id).await?;
        booking.state = BookingState::Abandoned;
        self.bookings.put(booking).await?;
        info!(booking = booking_id, "booking abandoned");
        Ok(())
    }

    async fn method(&self, method_id: PaymentMethodId) -> Result<PaymentMethod> {
        self.methods
            .get(method_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("payment method {method_id}")))
    }
}

fn gateway_customer(tenant: &Tenant) -> Result<String> {
    tenant.gateway_customer.clone().ok_or_else(|| {
        BookingError::Validation(format!("tenant {} has no gateway customer", tenant.id))
    })
}
