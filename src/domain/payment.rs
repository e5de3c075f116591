use crate::domain::{PaymentMethodId, TenantId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What kind of instrument a token resolved to. One explicit tag instead of
/// probing card fields and falling back to bank-account fields.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Card,
    BankAccount,
}

/// A stored payment instrument.
///
/// `(tenant, fingerprint)` is the dedup key: the fingerprint is a stable
/// content hash of the instrument, so the same card tokenized twice still
/// maps to one record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub tenant: TenantId,
    pub kind: InstrumentKind,
    pub fingerprint: String,
    /// Reference to the instrument on the gateway side.
    pub external_ref: String,
    pub last4: String,
    pub expiry: Option<NaiveDate>,
}

/// Descriptive metadata the gateway returns for an opaque instrument token,
/// before anything is persisted.
#[derive(Debug, PartialEq, Clone)]
pub struct InstrumentProfile {
    pub kind: InstrumentKind,
    pub fingerprint: String,
    pub last4: String,
    pub expiry: Option<NaiveDate>,
}
