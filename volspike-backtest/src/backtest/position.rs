//! Per-strike position state during replay.

use rust_decimal::Decimal;

/// Unclosed BUY units and running profit for one strike.
///
/// Created at the start of a strike's replay and dropped at its end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    amount_owned: u32,
    profit: Decimal,
}

impl Position {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn amount_owned(&self) -> u32 {
        self.amount_owned
    }

    pub fn profit(&self) -> Decimal {
        self.profit
    }

    pub fn is_flat(&self) -> bool {
        self.amount_owned == 0
    }

    /// Open one unit at `close`.
    pub fn buy(&mut self, close: Decimal) {
        self.amount_owned += 1;
        self.profit -= close;
    }

    /// Close every owned unit at `close`.
    ///
    /// The proceeds replace the running profit rather than adding to it, so
    /// earlier purchase costs and earlier round trips are discarded. Returns
    /// the number of units closed; a flat position is left untouched.
    pub fn sell(&mut self, close: Decimal) -> u32 {
        if self.is_flat() {
            return 0;
        }
        let units = self.amount_owned;
        self.profit = close * Decimal::from(units);
        self.amount_owned = 0;
        units
    }

    /// Mark any remaining units at the last close and add them to profit.
    pub fn liquidate(&mut self, last_close: Decimal) -> u32 {
        let units = self.amount_owned;
        self.profit += Decimal::from(units) * last_close;
        self.amount_owned = 0;
        units
    }
}
