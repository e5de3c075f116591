use crate::domain::money::Money;
use crate::domain::{BookingId, PaymentMethodId, PromoCodeId, SubscriptionId, TenantId, UnitId};
use crate::error::{BookingError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingState {
    #[default]
    Initiated,
    Locked,
    Finalized,
    Abandoned,
}

/// A tenant's reservation intent for one unit.
///
/// Mutated step by step by the orchestrator; terminal states are `Finalized`
/// (charged) and `Abandoned` (lock released, nothing charged).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Booking {
    pub id: BookingId,
    pub unit: UnitId,
    pub tenant: TenantId,
    pub subscription: Option<SubscriptionId>,
    pub promo_code: Option<PromoCodeId>,
    pub payment: Option<PaymentMethodId>,
    pub move_in_date: NaiveDate,
    /// Path of the signed lease document, filled in by the e-signature flow.
    pub sign_document: Option<String>,
    pub state: BookingState,
}

impl Booking {
    pub fn new(id: BookingId, unit: UnitId, tenant: TenantId, move_in_date: NaiveDate) -> Self {
        Self {
            id,
            unit,
            tenant,
            subscription: None,
            promo_code: None,
            payment: None,
            move_in_date,
            sign_document: None,
            state: BookingState::Initiated,
        }
    }
}

/// The billing agreement behind a booking: a monthly rate over a fixed term.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub unit: UnitId,
    /// Rate per month.
    pub rate: Money,
    pub months: u32,
    pub is_payed: bool,
    /// Gateway charge reference, set on the one successful charge.
    pub charge_ref: Option<String>,
    /// Gateway refund reference, set if the charge was later refunded.
    pub refund_ref: Option<String>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, unit: UnitId, rate: Money, months: u32) -> Self {
        Self {
            id,
            unit,
            rate,
            months,
            is_payed: false,
            charge_ref: None,
            refund_ref: None,
        }
    }

    /// The full amount the subscription is charged, before any discount.
    pub fn chargeable_total(&self) -> Money {
        self.rate.times(self.months)
    }

    /// Flips `is_payed` false -> true. That transition happens exactly once
    /// per subscription; a second call is a conflict, not a no-op.
    pub fn mark_paid(&mut self, charge_ref: String) -> Result<()> {
        if self.is_payed {
            return Err(BookingError::Conflict(format!(
                "subscription {} already paid",
                self.id
            )));
        }
        self.is_payed = true;
        self.charge_ref = Some(charge_ref);
        Ok(())
    }
}

/// The single administratively configured late-fee policy.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LateFee {
    pub amount: Money,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_chargeable_total() {
        let sub = Subscription::new(1, 1, Money::new(dec!(50.00)), 4);
        assert_eq!(sub.chargeable_total(), Money::new(dec!(200.00)));
    }

    #[test]
    fn test_mark_paid_is_once_only() {
        let mut sub = Subscription::new(1, 1, Money::new(dec!(50.00)), 4);
        sub.mark_paid("ch_1".into()).unwrap();
        assert!(sub.is_payed);
        assert_eq!(sub.charge_ref.as_deref(), Some("ch_1"));

        let err = sub.mark_paid("ch_2".into()).unwrap_err();
        assert!(matches!(err, BookingError::Conflict(_)));
        assert_eq!(sub.charge_ref.as_deref(), Some("ch_1"));
    }
}
