use thiserror::Error;

pub type Result<T> = std::result::Result<T, BookingError>;

/// Error taxonomy for the reservation core.
///
/// Every variant is scoped to a single booking attempt; nothing here is fatal
/// to the process. Compensation on failure is the orchestrator's business and
/// happens only where a variant's contract says so.
#[derive(Error, Debug)]
pub enum BookingError {
    /// A referenced record does not exist. No side effect has taken place.
    #[error("{0} not found")]
    NotFound(String),
    /// The unit is locked or booked by another booking, or the operation
    /// conflicts with the booking's current state. No side effect.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The promo code is unknown or inactive.
    #[error("invalid promo code: {0}")]
    InvalidCode(String),
    /// The promo code exists but does not apply to this subscription/booking.
    #[error("promo code not applicable: {0}")]
    NotApplicable(String),
    /// The gateway declined the instrument. Terminal; the caller must supply
    /// a different instrument, this is never retried automatically.
    #[error("payment instrument rejected: {0}")]
    InstrumentRejected(String),
    /// The gateway did not answer in time. Safe to retry with `repay = true`
    /// reusing the same idempotency key.
    #[error("payment gateway timed out: {0}")]
    GatewayTimeout(String),
    /// Refund requested for a booking that was never charged.
    #[error("booking not payable: {0}")]
    NotPayable(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl BookingError {
    /// Whether the caller may retry the same request verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::GatewayTimeout(_))
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        BookingError::Internal(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeouts_are_retryable() {
        assert!(BookingError::GatewayTimeout("no answer".into()).is_retryable());
        assert!(!BookingError::InstrumentRejected("declined".into()).is_retryable());
        assert!(!BookingError::Conflict("unit taken".into()).is_retryable());
    }
}
