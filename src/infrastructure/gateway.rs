use crate::domain::booking::Booking;
use crate::domain::money::Money;
use crate::domain::payment::{InstrumentKind, InstrumentProfile};
use crate::domain::ports::{ChargeReceipt, Notifier, PaymentGateway, RefundReceipt};
use crate::domain::tenant::Tenant;
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// How a scripted charge attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeFailure {
    Timeout,
    Declined,
}

#[derive(Debug, Clone)]
enum LedgerEntry {
    Posted(ChargeReceipt),
    Failed(ChargeFailure, String),
}

#[derive(Default)]
struct GatewayState {
    customers: HashMap<u32, String>,
    declined_tokens: HashSet<String>,
    next_failure: Option<ChargeFailure>,
    /// Outcome per idempotency key. A key that already maps to a posted
    /// charge is replayed as-is; a failed key is replayed too unless the
    /// caller forces a fresh attempt.
    ledger: HashMap<String, LedgerEntry>,
    attach_seq: u32,
    charge_seq: u32,
    refund_seq: u32,
    charges_posted: u32,
    charge_attempts: u32,
    instruments_attached: u32,
    refunds: Vec<String>,
}

/// Deterministic in-process stand-in for the external payment gateway.
///
/// Tokens follow the grammar `tok_{card|bank}_{suffix}`; the fingerprint is
/// derived from the suffix alone, so retokenizing the same instrument yields
/// the same fingerprint. Used by the demo binary and the test suite;
/// declines and timeouts are scriptable.
#[derive(Default, Clone)]
pub struct SandboxGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `attach_instrument` decline this token.
    pub async fn decline_token(&self, token: &str) {
        let mut state = self.state.lock().await;
        state.declined_tokens.insert(token.to_string());
    }

    /// Makes the next fresh charge attempt fail the given way. One-shot.
    pub async fn fail_next_charge(&self, failure: ChargeFailure) {
        let mut state = self.state.lock().await;
        state.next_failure = Some(failure);
    }

    /// Charges actually posted, i.e. successes. Idempotent replays do not
    /// count.
    pub async fn charges_posted(&self) -> u32 {
        self.state.lock().await.charges_posted
    }

    /// Fresh attempts executed against the gateway, including failures but
    /// excluding idempotent replays.
    pub async fn charge_attempts(&self) -> u32 {
        self.state.lock().await.charge_attempts
    }

    pub async fn instruments_attached(&self) -> u32 {
        self.state.lock().await.instruments_attached
    }

    pub async fn refunds(&self) -> Vec<String> {
        self.state.lock().await.refunds.clone()
    }

    fn parse_token(token: &str) -> Result<InstrumentProfile> {
        let mut parts = token.splitn(3, '_');
        let (Some("tok"), Some(kind), Some(suffix)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(BookingError::Validation(format!(
                "malformed instrument token: {token}"
            )));
        };
        let kind = match kind {
            "card" => InstrumentKind::Card,
            "bank" => InstrumentKind::BankAccount,
            other => {
                return Err(BookingError::Validation(format!(
                    "unknown instrument kind: {other}"
                )));
            }
        };
        let last4 = suffix
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        Ok(InstrumentProfile {
            kind,
            fingerprint: format!("fp_{suffix}"),
            last4,
            expiry: None,
        })
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn inspect_instrument(&self, token: &str) -> Result<InstrumentProfile> {
        Self::parse_token(token)
    }

    async fn ensure_customer(&self, tenant: &Tenant) -> Result<String> {
        let mut state = self.state.lock().await;
        let customer = state
            .customers
            .entry(tenant.id)
            .or_insert_with(|| format!("cus_{}", tenant.id));
        Ok(customer.clone())
    }

    async fn attach_instrument(&self, _customer_ref: &str, token: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        if state.declined_tokens.contains(token) {
            return Err(BookingError::InstrumentRejected(
                "the instrument was declined by the issuer".to_string(),
            ));
        }
        state.attach_seq += 1;
        state.instruments_attached += 1;
        Ok(format!("src_{}", state.attach_seq))
    }

    async fn charge(
        &self,
        _customer_ref: &str,
        _instrument_ref: &str,
        _amount: Money,
        idempotency_key: &str,
        force_retry: bool,
    ) -> Result<ChargeReceipt> {
        let mut state = self.state.lock().await;

        match state.ledger.get(idempotency_key) {
            Some(LedgerEntry::Posted(receipt)) => {
                // Coalesce: the same key never posts twice.
                return Ok(receipt.clone());
            }
            Some(LedgerEntry::Failed(failure, message)) if !force_retry => {
                let message = message.clone();
                return Err(match failure {
                    ChargeFailure::Timeout => BookingError::GatewayTimeout(message),
                    ChargeFailure::Declined => BookingError::InstrumentRejected(message),
                });
            }
            _ => {}
        }

        state.charge_attempts += 1;
        if let Some(failure) = state.next_failure.take() {
            let message = match failure {
                ChargeFailure::Timeout => "gateway did not respond".to_string(),
                ChargeFailure::Declined => "charge declined".to_string(),
            };
            state.ledger.insert(
                idempotency_key.to_string(),
                LedgerEntry::Failed(failure, message.clone()),
            );
            return Err(match failure {
                ChargeFailure::Timeout => BookingError::GatewayTimeout(message),
                ChargeFailure::Declined => BookingError::InstrumentRejected(message),
            });
        }

        state.charge_seq += 1;
        state.charges_posted += 1;
        let receipt = ChargeReceipt {
            charge_ref: format!("ch_{}", state.charge_seq),
        };
        state.ledger.insert(
            idempotency_key.to_string(),
            LedgerEntry::Posted(receipt.clone()),
        );
        Ok(receipt)
    }

    async fn refund(&self, charge_ref: &str) -> Result<RefundReceipt> {
        let mut state = self.state.lock().await;
        let known = state.ledger.values().any(
            |entry| matches!(entry, LedgerEntry::Posted(receipt) if receipt.charge_ref == charge_ref),
        );
        if !known {
            return Err(BookingError::Validation(format!(
                "unknown charge reference: {charge_ref}"
            )));
        }
        state.refund_seq += 1;
        state.refunds.push(charge_ref.to_string());
        Ok(RefundReceipt {
            refund_ref: format!("re_{}", state.refund_seq),
        })
    }
}

/// Notifier that only logs. Confirmation delivery is a collaborator concern;
/// the core treats it as fire-and-forget.
#[derive(Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn booking_confirmed(&self, booking: &Booking, tenant: &Tenant) -> Result<()> {
        info!(
            booking = booking.id,
            tenant = %tenant.email,
            "booking confirmation sent"
        );
        Ok(())
    }
}
