//! Anonymous client definitions.

use std::{sync::LazyLock, time::Duration};

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, FromStr};
use rand::Rng as _;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::domain::Session;
use crate::domain::{identity::Role, session};

/// Pseudonymous handle of an anonymous client within a single [`Session`].
///
/// A [`Handle`] is either chosen by the client at booking time or generated,
/// and is the only client identification the platform ever stores or shows.
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[as_ref(str, String)]
pub struct Handle(String);

impl Handle {
    /// Prefix of generated [`Handle`]s.
    const GENERATED_PREFIX: &'static str = "ANON-";

    /// Creates a new [`Handle`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `handle` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Creates a new [`Handle`] if the given `handle` is valid.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Option<Self> {
        let handle = handle.into();
        Self::check(&handle).then_some(Self(handle))
    }

    /// Generates a new random [`Handle`].
    #[must_use]
    pub fn generate() -> Self {
        /// Alphabet of the generated [`Handle`] suffix.
        const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

        let mut rng = rand::thread_rng();
        let suffix: String = (0..6)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        Self(format!("{}{suffix}", Self::GENERATED_PREFIX))
    }

    /// Checks whether the given `handle` is a valid [`Handle`].
    fn check(handle: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Handle`] invariants:
        /// - Either a generated `ANON-` handle, or a chosen one;
        /// - Chosen ones are 3 to 20 word characters;
        /// - No whitespace, no control characters.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(ANON-[A-Z2-9]{6}|[\p{L}\p{N}_]{3,20})$")
                .expect("valid regex")
        });

        REGEX.is_match(handle.as_ref())
    }
}

impl FromStr for Handle {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Handle`")
    }
}

/// Access token binding an anonymous client to their [`Session`].
///
/// Possession of a valid [`Token`] is the only client credential on the
/// platform. Tokens are minted at booking, re-minted on every extension, and
/// never stored server-side.
#[derive(AsRef, Clone, Debug, Display, FromStr)]
pub struct Token(String);

impl Token {
    /// Creates a new [`Token`] without checking its contents.
    ///
    /// # Safety
    ///
    /// The provided `token` must be a valid [`Token`] representation.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub const unsafe fn new_unchecked(token: String) -> Self {
        Self(token)
    }
}

/// Claims carried by a client [`Token`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Claims {
    /// ID of the [`Session`] the [`Token`] is scoped to.
    #[serde(rename = "sid")]
    pub session_id: session::Id,

    /// [`Role`] of the [`Token`] bearer.
    pub role: Role,

    /// [`Handle`] of the [`Token`] bearer.
    #[serde(rename = "sub")]
    pub handle: Handle,

    /// [`DateTime`] when the [`Token`] was issued.
    #[serde(rename = "iat", with = "common::datetime::serde::unix_timestamp")]
    pub issued_at: IssueDateTime,

    /// [`DateTime`] when the [`Token`] expires.
    #[serde(rename = "exp", with = "common::datetime::serde::unix_timestamp")]
    pub expires_at: ExpirationDateTime,
}

impl Claims {
    /// Extra [`Token`] validity granted on top of the paid [`Session`] time,
    /// letting a client still read the outcome of a [`Session`] that has just
    /// run out.
    pub const VALIDITY_MARGIN: Duration = Duration::from_secs(60 * 60);
}

/// Proven binding of a client [`Token`] bearer to their [`Session`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Binding {
    /// ID of the [`Session`] the bearer is bound to.
    pub session_id: session::Id,

    /// [`Handle`] of the bearer within that [`Session`].
    pub handle: Handle,
}

/// [`DateTime`] when a [`Token`] was issued.
pub type IssueDateTime = DateTimeOf<(Token, unit::Creation)>;

/// [`DateTime`] when a [`Token`] expires.
pub type ExpirationDateTime = DateTimeOf<(Token, unit::Expiration)>;
