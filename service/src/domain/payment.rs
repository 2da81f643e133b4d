//! Payment primitives.

use std::{str::FromStr, sync::LazyLock};

use derive_more::{AsRef, Display};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Session;

/// Idempotency reference of a single payment gateway charge.
///
/// A [`Reference`] is minted once per initiated charge, travels through the
/// gateway redirect untouched, and may pay for at most one booking or
/// extension. Replaying a [`Reference`] is how double-submitted payment
/// confirmations are detected.
#[derive(
    AsRef,
    Clone,
    Debug,
    Deserialize,
    Display,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
#[as_ref(str, String)]
pub struct Reference(String);

impl Reference {
    /// Creates a new [`Reference`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `reference` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Creates a new [`Reference`] if the given `reference` is valid.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Option<Self> {
        let reference = reference.into();
        Self::check(&reference).then_some(Self(reference))
    }

    /// Mints a new unique [`Reference`].
    #[must_use]
    pub fn mint() -> Self {
        Self(format!("CS-{}", Uuid::new_v4().simple()))
    }

    /// Checks whether the given `reference` is a valid [`Reference`].
    fn check(reference: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Reference`] invariants:
        /// - 1 to 64 characters;
        /// - Alphanumeric, `-` or `_` only.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid regex")
        });

        REGEX.is_match(reference.as_ref())
    }
}

impl FromStr for Reference {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Reference`")
    }
}

/// Contact the payment gateway sends its receipt to.
///
/// Collected for the gateway only and never attached to a [`Session`], so
/// paying doesn't deanonymize the client.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
pub struct Contact(String);

impl Contact {
    /// Creates a new [`Contact`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `contact` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(contact: impl Into<String>) -> Self {
        Self(contact.into())
    }

    /// Creates a new [`Contact`] if the given `contact` is valid.
    #[must_use]
    pub fn new(contact: impl Into<String>) -> Option<Self> {
        let contact = contact.into();
        Self::check(&contact).then_some(Self(contact))
    }

    /// Checks whether the given `contact` is a valid [`Contact`] email
    /// address.
    fn check(contact: impl AsRef<str>) -> bool {
        /// Regular expression checking the email address format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex")
        });

        REGEX.is_match(contact.as_ref())
    }
}

impl FromStr for Contact {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Contact`")
    }
}
