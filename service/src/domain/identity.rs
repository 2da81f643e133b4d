//! Caller identity definitions.

use serde::{Deserialize, Serialize};

#[cfg(doc)]
use crate::domain::Professional;
use crate::domain::{client, professional, Session};

/// Authenticated identity of a platform caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Identity {
    /// Anonymous client proven by a [`client::Token`].
    Client(client::Binding),

    /// [`Professional`] authenticated by the upstream account system.
    Staff(Staff),
}

impl Identity {
    /// Returns the [`Role`] this [`Identity`] acts in.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Client(_) => Role::Client,
            Self::Staff(_) => Role::Professional,
        }
    }

    /// Returns whether this [`Identity`] is a party of the provided
    /// [`Session`].
    ///
    /// A client is a party of the exact [`Session`] their [`client::Token`]
    /// is scoped to only, so one paid [`Session`] never grants any access to
    /// another.
    #[must_use]
    pub fn authorizes(&self, session: &Session) -> bool {
        match self {
            Self::Client(binding) => {
                binding.session_id == session.id
                    && binding.handle == session.client_handle
            }
            Self::Staff(staff) => {
                staff.professional_id == session.professional_id
            }
        }
    }
}

/// [`Professional`] side of an [`Identity`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Staff {
    /// ID of the acting [`Professional`].
    pub professional_id: professional::Id,
}

/// Party role within a [`Session`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[repr(u8)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Anonymous paying client.
    Client = 1,

    /// Consulted [`Professional`].
    Professional = 2,
}

impl Role {
    /// Returns the counterpart [`Role`] within the same [`Session`].
    #[must_use]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Client => Self::Professional,
            Self::Professional => Self::Client,
        }
    }
}
