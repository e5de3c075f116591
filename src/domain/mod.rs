pub mod booking;
pub mod money;
pub mod payment;
pub mod ports;
pub mod promo;
pub mod tenant;
pub mod unit;

pub type BookingId = u32;
pub type PaymentMethodId = u32;
pub type PromoCodeId = u32;
pub type SubscriptionId = u32;
pub type TenantId = u32;
pub type UnitId = u32;
