//! All-time highs.

use serde::{Deserialize, Serialize};

use super::price::{Currency, Price};

/// An all-time high.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ath {
    /// Highest price seen.
    pub price: Price,
}

impl Ath {
    /// Create an ATH.
    #[must_use]
    pub const fn new(price: Price) -> Self {
        Self { price }
    }

    /// Read a persisted ATH: the price as decimal text, optionally followed
    /// by a newline. Empty or malformed text yields zero.
    #[must_use]
    pub fn parse(text: &str, currency: Currency) -> Self {
        let value = text.trim().parse::<f64>().unwrap_or(0.0);
        Self::new(Price::new(value, currency))
    }

    /// Text written to the ATH file.
    #[must_use]
    pub fn to_persisted(&self) -> String {
        format!("{}\n", self.price.value)
    }
}

/// A new ATH replacing the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AthUpdate {
    /// ATH before the update.
    pub previous: Ath,
    /// New ATH.
    pub current: Ath,
}

/// Running maximum over a price sequence.
#[derive(Debug, Clone, Copy)]
pub struct AthTracker {
    best: Ath,
}

impl AthTracker {
    /// Start from a known ATH.
    #[must_use]
    pub const fn new(initial: Ath) -> Self {
        Self { best: initial }
    }

    /// Feed a price; returns the new ATH if the price beats the current one.
    ///
    /// Prices in another currency never count.
    pub fn observe(&mut self, price: Price) -> Option<Ath> {
        if price > self.best.price {
            self.best = Ath::new(price);
            Some(self.best)
        } else {
            None
        }
    }
}
