use crate::domain::booking::Subscription;
use crate::domain::money::Money;
use crate::domain::PromoCodeId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a promo code computes its discount.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum PromoRule {
    /// A flat amount off the subscription total.
    Fixed(Money),
    /// A percentage of the subscription total, e.g. `10` for 10%.
    Percent(Decimal),
    /// A flat amount off per billed month.
    PerMonth(Money),
}

impl PromoRule {
    pub fn kind(&self) -> &'static str {
        match self {
            PromoRule::Fixed(_) => "fixed",
            PromoRule::Percent(_) => "percent",
            PromoRule::PerMonth(_) => "per_month",
        }
    }
}

/// A discount rule identified by a code. Created administratively and
/// deactivated rather than mutated; once attached to a booking it stays
/// attached.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub code: String,
    pub is_active: bool,
    pub rule: PromoRule,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
}

impl PromoCode {
    pub fn new(id: PromoCodeId, code: impl Into<String>, rule: PromoRule) -> Self {
        Self {
            id,
            code: code.into(),
            is_active: true,
            rule,
            valid_from: None,
            valid_until: None,
        }
    }

    pub fn applies_on(&self, move_in: NaiveDate) -> bool {
        if let Some(from) = self.valid_from
            && move_in < from
        {
            return false;
        }
        if let Some(until) = self.valid_until
            && move_in > until
        {
            return false;
        }
        true
    }

    /// Computes the discount against a subscription.
    ///
    /// Pure function of the rule and the subscription's billing parameters:
    /// non-negative, capped at the chargeable total, rounded half-up to the
    /// smallest currency unit. The preview and the final charge both call
    /// this, so the two amounts cannot drift apart. A rule with negative
    /// parameters counts as no discount; it must never inflate the charge.
    pub fn discount_for(&self, subscription: &Subscription) -> Money {
        let total = subscription.chargeable_total();
        let raw = match &self.rule {
            PromoRule::Fixed(amount) => *amount,
            PromoRule::Percent(pct) => {
                Money::new(total.value() * *pct / Decimal::from(100))
            }
            PromoRule::PerMonth(amount) => amount.times(subscription.months),
        };
        let rounded = raw.round_cents();
        if rounded <= Money::ZERO {
            Money::ZERO
        } else if rounded > total {
            total
        } else {
            rounded
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn subscription(rate: Decimal, months: u32) -> Subscription {
        Subscription::new(1, 1, Money::new(rate), months)
    }

    #[test]
    fn test_percent_discount() {
        let promo = PromoCode::new(1, "SAVE10", PromoRule::Percent(dec!(10)));
        let sub = subscription(dec!(200.00), 1);
        assert_eq!(promo.discount_for(&sub), Money::new(dec!(20.00)));
    }

    #[test]
    fn test_percent_rounds_half_up() {
        // 15% of 33.33 = 4.9995 -> 5.00
        let promo = PromoCode::new(1, "SAVE15", PromoRule::Percent(dec!(15)));
        let sub = subscription(dec!(33.33), 1);
        assert_eq!(promo.discount_for(&sub), Money::new(dec!(5.00)));
    }

    #[test]
    fn test_fixed_discount_capped_at_total() {
        let promo = PromoCode::new(1, "BIGOFF", PromoRule::Fixed(Money::new(dec!(500.00))));
        let sub = subscription(dec!(100.00), 2);
        assert_eq!(promo.discount_for(&sub), Money::new(dec!(200.00)));
    }

    #[test]
    fn test_per_month_scales_with_duration() {
        let promo = PromoCode::new(1, "MONTHLY5", PromoRule::PerMonth(Money::new(dec!(5.00))));
        let sub = subscription(dec!(80.00), 6);
        assert_eq!(promo.discount_for(&sub), Money::new(dec!(30.00)));
    }

    #[test]
    fn test_negative_rule_never_inflates_the_charge() {
        let sub = subscription(dec!(200.00), 1);

        let promo = PromoCode::new(1, "OOPS", PromoRule::Percent(dec!(-10)));
        assert_eq!(promo.discount_for(&sub), Money::ZERO);

        let promo = PromoCode::new(2, "OOPS2", PromoRule::Fixed(Money::new(dec!(-5.00))));
        assert_eq!(promo.discount_for(&sub), Money::ZERO);

        let promo = PromoCode::new(3, "OOPS3", PromoRule::PerMonth(Money::new(dec!(-1.00))));
        assert_eq!(promo.discount_for(&sub), Money::ZERO);
    }

    #[test]
    fn test_discount_is_deterministic() {
        let promo = PromoCode::new(1, "SAVE10", PromoRule::Percent(dec!(10)));
        let sub = subscription(dec!(123.45), 3);
        assert_eq!(promo.discount_for(&sub), promo.discount_for(&sub));
    }

    #[test]
    fn test_validity_window() {
        let mut promo = PromoCode::new(1, "SPRING", PromoRule::Percent(dec!(10)));
        promo.valid_from = NaiveDate::from_ymd_opt(2026, 3, 1);
        promo.valid_until = NaiveDate::from_ymd_opt(2026, 5, 31);

        assert!(promo.applies_on(NaiveDate::from_ymd_opt(2026, 4, 15).unwrap()));
        assert!(!promo.applies_on(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()));
        assert!(!promo.applies_on(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()));
    }
}
