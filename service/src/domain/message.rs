//! [`Message`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Professional, Session};
use crate::domain::{client, identity::Role, professional, session};

/// Single chat message recorded within a [`Session`].
#[derive(Clone, Debug)]
pub struct Message {
    /// ID of this [`Message`].
    pub id: Id,

    /// ID of the [`Session`] this [`Message`] belongs to.
    pub session_id: session::Id,

    /// [`Role`] of the sending party.
    pub sender: Role,

    /// Displayed handle of the sending party.
    pub sender_handle: SenderHandle,

    /// [`Content`] of this [`Message`].
    pub content: Content,

    /// [`DateTime`] when this [`Message`] was recorded.
    pub sent_at: SentDateTime,

    /// Whether the receiving party has read this [`Message`].
    pub read_by_recipient: bool,
}

/// ID of a [`Message`].
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

/// Displayed handle of a [`Message`] sender.
///
/// For clients this is their pseudonymous [`client::Handle`], for
/// [`Professional`]s their public ID. Nothing else ever crosses the chat
/// boundary.
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[as_ref(str, String)]
pub struct SenderHandle(String);

impl From<&client::Handle> for SenderHandle {
    fn from(handle: &client::Handle) -> Self {
        Self(handle.to_string())
    }
}

impl From<professional::Id> for SenderHandle {
    fn from(id: professional::Id) -> Self {
        Self(id.to_string())
    }
}

/// Text content of a [`Message`].
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[as_ref(str, String)]
pub struct Content(String);

impl Content {
    /// Maximum byte length of a [`Content`].
    pub const MAX_LEN: usize = 4_096;

    /// Creates a new [`Content`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `content` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    /// Creates a new [`Content`] if the given `content` is valid.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        Self::check(&content).then_some(Self(content))
    }

    /// Checks whether the given `content` is a valid [`Content`].
    fn check(content: impl AsRef<str>) -> bool {
        let content = content.as_ref();
        !content.trim().is_empty() && content.len() <= Self::MAX_LEN
    }
}

/// Receipt clearing unread [`Message`]s of a [`Session`] for one party.
#[derive(Clone, Copy, Debug)]
pub struct MarkRead {
    /// ID of the [`Session`] whose [`Message`]s were read.
    pub session_id: session::Id,

    /// [`Role`] that has read them.
    pub reader: Role,
}

/// [`DateTime`] when a [`Message`] was recorded.
pub type SentDateTime = DateTimeOf<(Message, unit::Creation)>;

#[cfg(test)]
mod spec {
    use super::Content;

    #[test]
    fn content_rejects_blank_and_oversized_text() {
        assert!(Content::new("hello").is_some());
        assert!(Content::new("").is_none());
        assert!(Content::new("   \n\t").is_none());
        assert!(Content::new("x".repeat(Content::MAX_LEN)).is_some());
        assert!(Content::new("x".repeat(Content::MAX_LEN + 1)).is_none());
    }
}
