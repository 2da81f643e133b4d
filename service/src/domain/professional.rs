//! [`Professional`] definitions.

use common::Money;
use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Session;

/// Verified professional offering paid consultation [`Session`]s.
///
/// Account data of a [`Professional`] lives in the upstream account system.
/// This is only the bookable slice of it the session engine needs.
#[derive(Clone, Debug)]
pub struct Professional {
    /// ID of this [`Professional`].
    pub id: Id,

    /// Per-hour consultation rate of this [`Professional`].
    pub price_per_hour: Money,

    /// Whether this [`Professional`] passed verification and may be booked.
    pub is_verified: bool,
}

/// ID of a [`Professional`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}
