//! Prices and currencies.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Most fraction digits shown when formatting.
const MAX_FRACTION_DIGITS: usize = 12;

/// Fewest fraction digits shown when formatting.
const MIN_FRACTION_DIGITS: usize = 2;

/// Quote currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US dollar.
    Usd,
    /// Polish zloty.
    Pln,
}

impl Currency {
    /// ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Pln => "PLN",
        }
    }

    /// Prefix used in US-style currency formatting.
    const fn prefix(self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Pln => "PLN",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unknown currency code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown currency: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "PLN" => Ok(Self::Pln),
            _ => Err(UnknownCurrency(s.to_string())),
        }
    }
}

/// Amount in a currency.
///
/// Prices only order against prices in the same currency; comparing across
/// currencies yields `None`, so `>` and `<` are both false.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Amount.
    pub value: f64,
    /// Currency of `value`.
    pub currency: Currency,
}

impl Price {
    /// Create a price.
    #[must_use]
    pub const fn new(value: f64, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Price in US dollars.
    #[must_use]
    pub const fn usd(value: f64) -> Self {
        Self::new(value, Currency::Usd)
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency == other.currency {
            self.value.partial_cmp(&other.value)
        } else {
            None
        }
    }
}

/// US-locale currency format: `$1,830.514`, `PLN4.05`, `-$0.50`.
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.value.is_sign_negative() && self.value != 0.0 {
            "-"
        } else {
            ""
        };
        write!(
            f,
            "{sign}{}{}",
            self.currency.prefix(),
            format_amount(self.value.abs())
        )
    }
}

fn format_amount(value: f64) -> String {
    // Shortest round-trip digits, unless that needs more than the maximum.
    let mut text = value.to_string();
    if text
        .split_once('.')
        .is_some_and(|(_, fraction)| fraction.len() > MAX_FRACTION_DIGITS)
    {
        text = format!("{value:.MAX_FRACTION_DIGITS$}");
    }
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let mut fraction = fraction.trim_end_matches('0').to_string();
    while fraction.len() < MIN_FRACTION_DIGITS {
        fraction.push('0');
    }

    format!("{}.{fraction}", group_thousands(integer))
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(Price::usd(1830.514), "$1,830.514" ; "three decimals")]
    #[test_case(Price::usd(64_000.0), "$64,000.00" ; "padded to two decimals")]
    #[test_case(Price::usd(2.5), "$2.50" ; "one decimal")]
    #[test_case(Price::usd(1_234_567.891), "$1,234,567.891" ; "millions")]
    #[test_case(Price::usd(0.000_000_074_994_848_669_8), "$0.000000074995" ; "rounded to twelve")]
    #[test_case(Price::usd(-0.5), "-$0.50" ; "negative")]
    #[test_case(Price::new(4.0512, Currency::Pln), "PLN4.0512" ; "zloty")]
    #[test_case(Price::usd(0.0), "$0.00" ; "zero")]
    fn formats_us_locale(price: Price, expected: &str) {
        assert_eq!(price.to_string(), expected);
    }

    #[test]
    fn compares_within_currency() {
        assert!(Price::usd(2.0) > Price::usd(1.0));
        assert!(Price::usd(1.0) < Price::usd(2.0));
    }

    #[test]
    fn different_currencies_do_not_order() {
        let usd = Price::usd(2.0);
        let pln = Price::new(1.0, Currency::Pln);
        assert_eq!(usd.partial_cmp(&pln), None);
        assert!(!(usd > pln));
        assert!(!(usd < pln));
    }

    #[test_case("usd", Currency::Usd)]
    #[test_case("PLN", Currency::Pln)]
    #[test_case(" Usd ", Currency::Usd)]
    fn parses_currency(code: &str, expected: Currency) {
        assert_eq!(code.parse::<Currency>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_currency() {
        assert!("EUR".parse::<Currency>().is_err());
    }
}
