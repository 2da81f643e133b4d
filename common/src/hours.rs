//! [`Hours`]-related definitions.

use std::{num::NonZeroU16, ops, str::FromStr, time::Duration};

use derive_more::Display;
use rust_decimal::Decimal;

use crate::Money;

/// Whole count of billed consultation hours.
///
/// This is the only duration unit sold on the platform: a booking or an
/// extension is always a whole number of hours, and every expiry instant is
/// derived from it via [`Hours::duration()`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Hours(NonZeroU16);

impl Hours {
    /// One billed hour.
    pub const ONE: Self = Self(NonZeroU16::MIN);

    /// Maximum [`Hours`] purchasable in a single booking or extension.
    pub const MAX: u16 = 24;

    /// Creates a new [`Hours`] count if the given `hours` value is valid.
    #[must_use]
    pub fn new(hours: u16) -> Option<Self> {
        (hours <= Self::MAX)
            .then_some(())
            .and_then(|()| NonZeroU16::new(hours))
            .map(Self)
    }

    /// Creates a new [`Hours`] count without checking the upper bound.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `hours` value does not exceed
    /// [`Hours::MAX`].
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(hours: NonZeroU16) -> Self {
        Self(hours)
    }

    /// Returns this [`Hours`] count as a plain number.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0.get()
    }

    /// Returns the exact wall-clock [`Duration`] this [`Hours`] count spans.
    #[must_use]
    pub fn duration(self) -> Duration {
        Duration::from_secs(u64::from(self.0.get()) * 60 * 60)
    }
}

impl FromStr for Hours {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u16>()
            .ok()
            .and_then(Self::new)
            .ok_or("invalid `Hours`")
    }
}

impl TryFrom<u16> for Hours {
    type Error = &'static str;

    fn try_from(hours: u16) -> Result<Self, Self::Error> {
        Self::new(hours).ok_or("invalid `Hours`")
    }
}

impl ops::Mul<Hours> for Money {
    type Output = Money;

    /// Computes the price of the given [`Hours`] count at this per-hour rate.
    fn mul(self, rhs: Hours) -> Self::Output {
        Money {
            amount: self.amount * Decimal::from(rhs.get()),
            currency: self.currency,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::{str::FromStr as _, time::Duration};

    use rust_decimal::Decimal;

    use crate::money::{Currency, Money};

    use super::Hours;

    #[test]
    fn rejects_zero_and_oversized_counts() {
        assert!(Hours::new(0).is_none());
        assert!(Hours::new(Hours::MAX + 1).is_none());
        assert!(Hours::new(1).is_some());
        assert!(Hours::new(Hours::MAX).is_some());
    }

    #[test]
    fn duration_is_exact_wall_clock_hours() {
        assert_eq!(
            Hours::new(1).unwrap().duration(),
            Duration::from_secs(3_600),
        );
        assert_eq!(
            Hours::new(24).unwrap().duration(),
            Duration::from_secs(24 * 3_600),
        );
    }

    #[test]
    fn multiplies_per_hour_rate_into_total_price() {
        let rate = Money {
            amount: Decimal::from(500),
            currency: Currency::Ngn,
        };

        assert_eq!(
            rate * Hours::new(2).unwrap(),
            Money {
                amount: Decimal::from(1_000),
                currency: Currency::Ngn,
            },
        );
    }

    #[test]
    fn from_str() {
        assert_eq!(Hours::from_str("3").unwrap(), Hours::new(3).unwrap());
        assert!(Hours::from_str("0").is_err());
        assert!(Hours::from_str("25").is_err());
        assert!(Hours::from_str("three").is_err());
    }
}
