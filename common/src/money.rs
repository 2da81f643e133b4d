//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

use rust_decimal::{prelude::ToPrimitive as _, Decimal};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Adds the provided [`Money`] to this one.
    ///
    /// [`None`] is returned if the two amounts are in different
    /// [`Currency`]ies, or if the sum overflows.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        (self.currency == rhs.currency)
            .then(|| self.amount.checked_add(rhs.amount))
            .flatten()
            .map(|amount| Self {
                amount,
                currency: self.currency,
            })
    }

    /// Returns whether this [`Money`] fully covers the provided `due` amount.
    ///
    /// An amount in a different [`Currency`] covers nothing.
    #[must_use]
    pub fn covers(&self, due: &Self) -> bool {
        self.currency == due.currency && self.amount >= due.amount
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        if amount.is_integer() {
            write!(f, "{}{currency}", amount.to_i128().expect("integer"))
        } else {
            write!(f, "{amount}{currency}")
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "Nigerian Naira."]
        Ngn = 1,

        #[doc = "US Dollar."]
        Usd = 2,

        #[doc = "Euro."]
        Eur = 3,
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn from_str() {
        assert_eq!(
            Money::from_str("500NGN").unwrap(),
            Money {
                amount: decimal("500"),
                currency: Currency::Ngn,
            },
        );

        assert_eq!(
            Money::from_str("123.45USD").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Usd,
            },
        );

        assert_eq!(
            Money::from_str("123.45EUR").unwrap(),
            Money {
                amount: decimal("123.45"),
                currency: Currency::Eur,
            },
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Ng").is_err());
        assert!(Money::from_str("123.45Nairas").is_err());

        assert!(Money::from_str("123.00NGN").is_ok());
        assert!(Money::from_str("123.0NGN").is_ok());
        assert!(Money::from_str("123NGN").is_ok());
    }

    #[test]
    fn to_string() {
        assert_eq!(
            Money {
                amount: decimal("500"),
                currency: Currency::Ngn,
            }
            .to_string(),
            "500NGN",
        );

        assert_eq!(
            Money {
                amount: decimal("123.45"),
                currency: Currency::Usd,
            }
            .to_string(),
            "123.45USD",
        );

        assert_eq!(
            Money {
                amount: decimal("123.00"),
                currency: Currency::Ngn,
            }
            .to_string(),
            "123NGN",
        );
    }

    #[test]
    fn checked_add_requires_matching_currency() {
        let a = Money {
            amount: decimal("500"),
            currency: Currency::Ngn,
        };
        let b = Money {
            amount: decimal("1000"),
            currency: Currency::Ngn,
        };
        let usd = Money {
            amount: decimal("1"),
            currency: Currency::Usd,
        };

        assert_eq!(
            a.checked_add(b),
            Some(Money {
                amount: decimal("1500"),
                currency: Currency::Ngn,
            }),
        );
        assert_eq!(a.checked_add(usd), None);
    }

    #[test]
    fn covers_compares_within_one_currency_only() {
        let due = Money {
            amount: decimal("1000"),
            currency: Currency::Ngn,
        };
        let paid = Money {
            amount: decimal("1000"),
            currency: Currency::Ngn,
        };
        let short = Money {
            amount: decimal("999.99"),
            currency: Currency::Ngn,
        };
        let foreign = Money {
            amount: decimal("5000"),
            currency: Currency::Usd,
        };

        assert!(paid.covers(&due));
        assert!(!short.covers(&due));
        assert!(!foreign.covers(&due));
    }
}
