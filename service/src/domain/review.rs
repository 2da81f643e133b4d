//! [`Review`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display};
use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::domain::Session;
use crate::domain::session;

/// Anonymous client review of a closed [`Session`].
///
/// At most one [`Review`] exists per [`Session`], and it carries no client
/// identification beyond the [`Session`] it belongs to.
#[derive(Clone, Debug)]
pub struct Review {
    /// ID of the reviewed [`Session`].
    pub session_id: session::Id,

    /// [`Rating`] given by the client.
    pub rating: Rating,

    /// Optional free-form [`Comment`].
    pub comment: Option<Comment>,

    /// [`DateTime`] when this [`Review`] was submitted.
    pub created_at: CreationDateTime,
}

/// Star rating of a [`Review`], from 1 to 5.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Ord, PartialEq, PartialOrd,
    Serialize,
)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    /// Creates a new [`Rating`] if the given `stars` value is within 1 to 5.
    #[must_use]
    pub fn new(stars: u8) -> Option<Self> {
        (1..=5).contains(&stars).then_some(Self(stars))
    }

    /// Returns this [`Rating`] as a plain number of stars.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// Free-form comment of a [`Review`].
#[derive(AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[as_ref(str, String)]
pub struct Comment(String);

impl Comment {
    /// Maximum byte length of a [`Comment`].
    pub const MAX_LEN: usize = 2_048;

    /// Creates a new [`Comment`] if the given `comment` is valid.
    #[must_use]
    pub fn new(comment: impl Into<String>) -> Option<Self> {
        let comment = comment.into();
        let trimmed = comment.trim();
        (!trimmed.is_empty() && comment.len() <= Self::MAX_LEN)
            .then_some(Self(comment))
    }
}

/// [`DateTime`] when a [`Review`] was submitted.
pub type CreationDateTime = DateTimeOf<(Review, unit::Creation)>;

#[cfg(test)]
mod spec {
    use super::{Comment, Rating};

    #[test]
    fn rating_is_one_to_five_stars() {
        assert!(Rating::new(0).is_none());
        assert!(Rating::new(6).is_none());
        assert_eq!(Rating::new(1).map(Rating::get), Some(1));
        assert_eq!(Rating::new(5).map(Rating::get), Some(5));
    }

    #[test]
    fn comment_rejects_blank_and_oversized_text() {
        assert!(Comment::new("very helpful").is_some());
        assert!(Comment::new("  ").is_none());
        assert!(Comment::new("x".repeat(Comment::MAX_LEN + 1)).is_none());
    }
}
