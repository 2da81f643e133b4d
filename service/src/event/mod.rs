//! Lifecycle [`Event`]s of the session engine.

use tokio::sync::broadcast;

#[cfg(doc)]
use crate::domain::{Message, Professional, Session};
use crate::domain::{
    identity::Role,
    session::{self, EndedBy},
};

/// Lifecycle event published by the session engine.
///
/// Every state transition committed to storage is announced here exactly
/// once, feeding the room router and the notification relay without either
/// of them touching the write path.
#[derive(Clone, Debug)]
pub enum Event {
    /// [`Session`] was paid for and booked.
    Booked {
        /// ID of the booked [`Session`].
        session_id: session::Id,
    },

    /// [`Session`] became active and its clock started.
    Activated {
        /// ID of the activated [`Session`].
        session_id: session::Id,
    },

    /// [`Session`] was extended and its expiry pushed forward.
    Extended {
        /// ID of the extended [`Session`].
        session_id: session::Id,

        /// New expiry instant of the [`Session`].
        expires_at: session::ExpirationDateTime,
    },

    /// [`Message`] was recorded within a [`Session`].
    MessageRecorded {
        /// ID of the [`Session`] the [`Message`] belongs to.
        session_id: session::Id,

        /// [`Role`] of the sending party.
        sender: Role,
    },

    /// [`Session`] was deliberately ended by one of its parties.
    Ended {
        /// ID of the ended [`Session`].
        session_id: session::Id,

        /// Party that ended the [`Session`].
        by: EndedBy,
    },

    /// [`Session`] clock ran out and the sweeper closed it.
    Expired {
        /// ID of the expired [`Session`].
        session_id: session::Id,
    },

    /// [`Session`] was never engaged and its booking was withdrawn.
    Cancelled {
        /// ID of the cancelled [`Session`].
        session_id: session::Id,
    },
}

/// Broadcast channel of [`Event`]s.
#[derive(Clone, Debug)]
pub struct Channel(broadcast::Sender<Event>);

impl Channel {
    /// Number of not-yet-received [`Event`]s a single subscriber may lag
    /// behind before losing the oldest ones.
    const CAPACITY: usize = 256;

    /// Creates a new [`Channel`].
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(Self::CAPACITY);
        Self(tx)
    }

    /// Subscribes to all the [`Event`]s published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.0.subscribe()
    }

    /// Publishes the provided [`Event`] to all current subscribers.
    ///
    /// Publishing with no subscribers is a no-op.
    pub fn publish(&self, event: Event) {
        _ = self.0.send(event);
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}
