//! Decimal money helpers.
//!
//! Prices are carried as [`rust_decimal::Decimal`] in the currency's
//! standard unit (dollars, not cents). The backend renders totals with two
//! decimal places, so every derived amount is rounded the same way.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round a monetary amount to two decimal places (half-up).
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Compute a line total: `price * quantity`, rounded to two decimal places.
#[must_use]
pub fn line_total(price: Decimal, quantity: u32) -> Decimal {
    round_money(price * Decimal::from(quantity))
}

/// Format a monetary amount with exactly two decimal places (e.g. `"19.90"`).
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    format!("{:.2}", round_money(amount))
}
