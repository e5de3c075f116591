use crate::domain::money::Money;
use crate::domain::ports::{
    PromoCodeStore, PromoCodeStoreRef, SubscriptionStore, SubscriptionStoreRef,
};
use crate::domain::promo::PromoCode;
use crate::domain::{PromoCodeId, SubscriptionId};
use crate::error::{BookingError, Result};
use chrono::NaiveDate;

/// A validated promo application: the code's id, its rule kind, and the
/// exact amount that will be deducted at charge time.
#[derive(Debug, PartialEq, Clone)]
pub struct PromoQuote {
    pub promo_id: PromoCodeId,
    pub kind: &'static str,
    pub discount: Money,
}

/// Validates promo codes against a subscription and computes the discount.
///
/// The preview endpoint and the orchestrator both come through here, so the
/// amount a tenant is shown is the amount the charge deducts.
pub struct PromoCodeEvaluator {
    promos: PromoCodeStoreRef,
    subscriptions: SubscriptionStoreRef,
}

impl PromoCodeEvaluator {
    pub fn new(promos: PromoCodeStoreRef, subscriptions: SubscriptionStoreRef) -> Self {
        Self {
            promos,
            subscriptions,
        }
    }

    /// Validates by code, as the preview endpoint supplies it.
    pub async fn quote(
        &self,
        code: &str,
        subscription_id: SubscriptionId,
        move_in: NaiveDate,
    ) -> Result<PromoQuote> {
        let promo = self
            .promos
            .find_by_code(code)
            .await?
            .ok_or_else(|| BookingError::InvalidCode(code.to_string()))?;
        self.evaluate(promo, subscription_id, move_in).await
    }

    /// Validates by id, as the orchestrator supplies it.
    pub async fn quote_by_id(
        &self,
        promo_id: PromoCodeId,
        subscription_id: SubscriptionId,
        move_in: NaiveDate,
    ) -> Result<PromoQuote> {
        let promo = self
            .promos
            .get(promo_id)
            .await?
            .ok_or_else(|| BookingError::InvalidCode(format!("promo {promo_id}")))?;
        self.evaluate(promo, subscription_id, move_in).await
    }

    async fn evaluate(
        &self,
        promo: PromoCode,
        subscription_id: SubscriptionId,
        move_in: NaiveDate,
    ) -> Result<PromoQuote> {
        if !promo.is_active {
            return Err(BookingError::InvalidCode(promo.code));
        }
        let subscription = self
            .subscriptions
            .get(subscription_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("subscription {subscription_id}")))?;

        if !promo.applies_on(move_in) {
            return Err(BookingError::NotApplicable(format!(
                "code {} does not cover move-in date {move_in}",
                promo.code
            )));
        }
        if subscription.chargeable_total().is_zero() {
            return Err(BookingError::NotApplicable(format!(
                "subscription {subscription_id} has nothing to charge"
            )));
        }

        Ok(PromoQuote {
            promo_id: promo.id,
            kind: promo.rule.kind(),
            discount: promo.discount_for(&subscription),
        })
    }
}
