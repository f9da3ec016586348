//! Monetary amounts in minor currency units.

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// Amount in the smallest currency unit (e.g. cents) tagged with an ISO code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: u64,
    pub currency: String,
}

impl ValueObject for Money {}

impl Money {
    pub fn new(amount: u64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02} {}", self.amount / 100, self.amount % 100, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_by_value() {
        assert_eq!(Money::new(1999, "EUR"), Money::new(1999, "EUR"));
        assert_ne!(Money::new(1999, "EUR"), Money::new(1999, "USD"));
    }

    #[test]
    fn displays_major_and_minor_units() {
        assert_eq!(Money::new(1905, "EUR").to_string(), "19.05 EUR");
    }
}
