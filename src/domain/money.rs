//! Money type
//!
//! Domain primitive for monetary amounts with a fixed 4-fraction-digit scale.
//! All amounts are validated at construction time, ensuring invalid values
//! cannot exist in the system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest value the ledger's NUMERIC(20, 4) columns can hold
const MAX_AMOUNT: &str = "9999999999999999.9999";

/// Maximum fraction digits (4)
const MAX_SCALE: u32 = 4;

/// Money represents a validated monetary amount.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum 4 fraction digits
/// - Fits in a NUMERIC(20, 4) column
///
/// # Example
/// ```
/// use ledger_api::domain::Money;
///
/// let amount: Money = "100.5000".parse().unwrap();
/// assert_eq!(amount.to_string(), "100.5000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

/// Errors that can occur when creating a Money value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount has too many fraction digits (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum representable value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Money {
    /// Create a new Money value with validation.
    ///
    /// # Errors
    /// - `MoneyError::NotPositive` if value <= 0
    /// - `MoneyError::TooManyDecimals` if more than 4 fraction digits
    /// - `MoneyError::Overflow` if the value does not fit NUMERIC(20, 4)
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::NotPositive(value));
        }

        if value.scale() > MAX_SCALE {
            return Err(MoneyError::TooManyDecimals(value.scale()));
        }

        let max = Decimal::from_str(MAX_AMOUNT).expect("Invalid MAX_AMOUNT constant");
        if value > max {
            return Err(MoneyError::Overflow);
        }

        Ok(Self(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Add two amounts, rejecting sums that leave the representable range.
    pub fn try_add(&self, other: &Money) -> Result<Money, MoneyError> {
        let sum = self.0.checked_add(other.0).ok_or(MoneyError::Overflow)?;
        Money::new(sum)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s).map_err(|e| MoneyError::ParseError(e.to_string()))?;
        Money::new(decimal)
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Money::from_str(&value)
    }
}

impl From<Money> for String {
    fn from(amount: Money) -> Self {
        format!("{:.4}", amount.0)
    }
}

// Note: no Sub/Neg on Money itself. Signed arithmetic lives on Balance,
// where a negative intermediate value is meaningful (it is what the
// integrity check looks for).

/// Balance represents a derived account balance: the signed sum of CREDIT
/// entries minus DEBIT entries. Unlike Money it may be zero, and it may be
/// transiently negative inside a unit of work; committed balances are
/// required to be non-negative by the engine's integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct Balance(Decimal);

impl Balance {
    /// The empty balance (account with no entries).
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Wrap an already-derived sum (e.g. read from an aggregate query).
    pub fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    /// Get the underlying value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Apply a CREDIT entry.
    pub fn credit(&self, amount: &Money) -> Balance {
        Self(self.0 + amount.value())
    }

    /// Apply a DEBIT entry.
    pub fn debit(&self, amount: &Money) -> Balance {
        Self(self.0 - amount.value())
    }

    /// True when the balance has gone below zero.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

impl From<Balance> for String {
    fn from(balance: Balance) -> Self {
        format!("{:.4}", balance.0)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_positive() {
        let amount = Money::new(dec!(100));
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), dec!(100));
    }

    #[test]
    fn test_money_zero_rejected() {
        let amount = Money::new(Decimal::ZERO);
        assert!(matches!(amount, Err(MoneyError::NotPositive(_))));
    }

    #[test]
    fn test_money_negative_rejected() {
        let amount = Money::new(dec!(-100));
        assert!(matches!(amount, Err(MoneyError::NotPositive(_))));
    }

    #[test]
    fn test_money_too_many_decimals() {
        // 0.12345 has 5 fraction digits
        let amount = Money::new(dec!(0.12345));
        assert!(matches!(amount, Err(MoneyError::TooManyDecimals(5))));
    }

    #[test]
    fn test_money_max_decimals_ok() {
        let amount = Money::new(dec!(0.1234));
        assert!(amount.is_ok());
    }

    #[test]
    fn test_money_overflow() {
        let value = Decimal::from_str("10000000000000000").unwrap();
        let amount = Money::new(value);
        assert!(matches!(amount, Err(MoneyError::Overflow)));
    }

    #[test]
    fn test_money_max_value_ok() {
        let value = Decimal::from_str(MAX_AMOUNT).unwrap();
        let amount = Money::new(value);
        assert!(amount.is_ok());
    }

    #[test]
    fn test_money_from_str() {
        let amount: Result<Money, _> = "123.456".parse();
        assert!(amount.is_ok());
        assert_eq!(amount.unwrap().value(), dec!(123.456));
    }

    #[test]
    fn test_money_from_str_garbage() {
        let amount: Result<Money, _> = "12.3.4".parse();
        assert!(matches!(amount, Err(MoneyError::ParseError(_))));
    }

    #[test]
    fn test_money_display_is_stable() {
        let amount: Money = "40".parse().unwrap();
        assert_eq!(amount.to_string(), "40.0000");

        let amount: Money = "40.5".parse().unwrap();
        assert_eq!(amount.to_string(), "40.5000");
    }

    #[test]
    fn test_money_compare() {
        let small: Money = "1.0001".parse().unwrap();
        let large: Money = "1.0002".parse().unwrap();
        assert!(small < large);

        // Equality is numeric, not textual
        let a: Money = "1.5".parse().unwrap();
        let b: Money = "1.5000".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_money_try_add() {
        let a: Money = "100.0000".parse().unwrap();
        let b: Money = "50.5000".parse().unwrap();
        let sum = a.try_add(&b).unwrap();
        assert_eq!(sum.value(), dec!(150.5));
    }

    #[test]
    fn test_money_try_add_overflow() {
        let a = Money::new(Decimal::from_str(MAX_AMOUNT).unwrap()).unwrap();
        let b: Money = "1".parse().unwrap();
        assert!(matches!(a.try_add(&b), Err(MoneyError::Overflow)));
    }

    #[test]
    fn test_balance_credit_debit() {
        let amount: Money = "100".parse().unwrap();
        let balance = Balance::zero().credit(&amount);
        assert_eq!(balance.value(), dec!(100));

        let withdraw: Money = "30".parse().unwrap();
        let balance = balance.debit(&withdraw);
        assert_eq!(balance.value(), dec!(70));
        assert!(!balance.is_negative());
    }

    #[test]
    fn test_balance_can_go_negative() {
        let amount: Money = "100".parse().unwrap();
        let balance = Balance::zero().debit(&amount);
        assert!(balance.is_negative());
        assert_eq!(balance.value(), dec!(-100));
    }

    #[test]
    fn test_balance_display() {
        let balance = Balance::from_decimal(dec!(60));
        assert_eq!(balance.to_string(), "60.0000");
        assert_eq!(Balance::zero().to_string(), "0.0000");
    }
}
