use crate::error::{BookingError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandOp {
    /// Seeds a percentage promo code (`promo` = code, `amount` = percent).
    Promo,
    Complete,
    Abandon,
    Fee,
    Refund,
}

/// One line of a scripted booking scenario. Unused columns stay empty;
/// which ones are required depends on the op.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct BookingCommand {
    pub op: CommandOp,
    pub booking: Option<u32>,
    pub tenant: Option<u32>,
    pub unit: Option<u32>,
    pub subscription: Option<u32>,
    pub promo: Option<String>,
    pub token: Option<String>,
    pub repay: Option<bool>,
    pub amount: Option<Decimal>,
    pub months: Option<u32>,
}

/// Reads booking commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// yielding commands lazily so large scenario files stream.
pub struct ScenarioReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScenarioReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<BookingCommand>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BookingError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "op, booking, tenant, unit, subscription, promo, token, repay, amount, months\n\
                    promo, , , , , SAVE10, , , 10, \n\
                    complete, 1, 1, 10, 5, SAVE10, tok_card_visa4242, false, 200.00, 1";
        let reader = ScenarioReader::new(data.as_bytes());
        let commands: Vec<_> = reader.commands().collect::<Result<_>>().unwrap();

        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].op, CommandOp::Promo);
        assert_eq!(commands[0].amount, Some(dec!(10)));
        assert_eq!(commands[1].op, CommandOp::Complete);
        assert_eq!(commands[1].booking, Some(1));
        assert_eq!(commands[1].token.as_deref(), Some("tok_card_visa4242"));
        assert_eq!(commands[1].repay, Some(false));
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "op, booking, tenant, unit, subscription, promo, token, repay, amount, months\n\
                    teleport, 1, , , , , , , ,";
        let reader = ScenarioReader::new(data.as_bytes());
        let results: Vec<_> = reader.commands().collect();
        assert!(results[0].is_err());
    }
}
