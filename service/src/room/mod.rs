//! Per-[`Session`] chat room routing.

use std::{convert::Infallible, sync::Arc};

use dashmap::DashMap;
use derive_more::Display;
use tokio::sync::{broadcast, mpsc};
use tracing as log;
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::Session;
use crate::{
    domain::{
        identity::Role,
        session::{self, Status},
        Message,
    },
    event::Event,
};

/// Router of live connections into per-[`Session`] rooms.
///
/// A room holds at most one live connection per [`Role`], keyed by the
/// [`Session`] the connection proved itself a party of when joining. Frames
/// are only ever relayed to the counterpart slot of the same room, so no
/// payload can cross from one [`Session`] into another.
///
/// Cheap to [`Clone`]: every clone shares the same underlying rooms.
#[derive(Clone, Debug, Default)]
pub struct Router(Arc<DashMap<session::Id, Room>>);

impl Router {
    /// Creates a new empty [`Router`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the room of the provided [`Session`] in the provided [`Role`],
    /// delivering room traffic into the provided sender.
    ///
    /// A newer join replaces an older live connection of the same [`Role`]:
    /// the replaced connection receives a final [`Outbound::Replaced`] frame
    /// and is detached.
    pub fn join(
        &self,
        session_id: session::Id,
        role: Role,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> Attachment {
        let peer = Peer {
            connection: Connection::new(),
            sender,
        };
        let attachment = Attachment {
            session_id,
            role,
            connection: peer.connection,
        };

        let mut room = self.0.entry(session_id).or_default();
        if let Some(replaced) = room.slot_mut(role).replace(peer) {
            _ = replaced.sender.send(Outbound::Replaced);
        }
        attachment
    }

    /// Leaves the room previously joined under the provided [`Attachment`].
    ///
    /// A connection only vacates its own slot: if a newer join has replaced
    /// it already, the newer connection stays attached.
    pub fn leave(&self, attachment: &Attachment) {
        if let Some(mut room) = self.0.get_mut(&attachment.session_id) {
            let slot = room.slot_mut(attachment.role);
            if slot
                .as_ref()
                .is_some_and(|p| p.connection == attachment.connection)
            {
                *slot = None;
            }
            let vacant = room.is_vacant();
            drop(room);
            if vacant {
                _ = self
                    .0
                    .remove_if(&attachment.session_id, |_, r| r.is_vacant());
            }
        }
    }

    /// Relays the provided frame to the counterpart of the provided
    /// [`Attachment`] within its room.
    ///
    /// Returns whether a live counterpart received the frame. The sending
    /// side never receives its own frame back.
    pub fn relay(&self, from: &Attachment, outbound: Outbound) -> bool {
        self.0
            .get(&from.session_id)
            .and_then(|room| {
                room.slot(from.role.counterpart())
                    .as_ref()
                    .map(|peer| peer.sender.send(outbound).is_ok())
            })
            .unwrap_or(false)
    }

    /// Closes the room of the provided [`Session`], telling both live
    /// connections the terminal [`Status`] it was closed in.
    pub fn evict(&self, session_id: session::Id, status: Status) {
        if let Some((_, room)) = self.0.remove(&session_id) {
            for peer in [room.client, room.professional].into_iter().flatten()
            {
                _ = peer.sender.send(Outbound::Closed { status });
            }
        }
    }

    /// Returns whether a connection is live in the room of the provided
    /// [`Session`] in the provided [`Role`].
    #[must_use]
    pub fn is_joined(&self, session_id: session::Id, role: Role) -> bool {
        self.0
            .get(&session_id)
            .is_some_and(|room| room.slot(role).is_some())
    }

    /// Watches the provided [`Event`]s, closing rooms of [`Session`]s that
    /// reach a terminal [`Status`], until the event channel closes.
    pub async fn watch(
        self,
        mut events: broadcast::Receiver<Event>,
    ) -> Result<(), Infallible> {
        loop {
            match events.recv().await {
                Ok(Event::Ended { session_id, .. }) => {
                    self.evict(session_id, Status::Ended);
                }
                Ok(Event::Expired { session_id }) => {
                    self.evict(session_id, Status::Expired);
                }
                Ok(Event::Cancelled { session_id }) => {
                    self.evict(session_id, Status::Cancelled);
                }
                Ok(Event::Booked { .. }
                | Event::Activated { .. }
                | Event::Extended { .. }
                | Event::MessageRecorded { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "room eviction watcher lagged, {skipped} events lost",
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }
}

/// Proof of a live connection joined into a room.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Attachment {
    /// ID of the [`Session`] whose room was joined.
    pub session_id: session::Id,

    /// [`Role`] the room was joined in.
    pub role: Role,

    /// ID of the joined connection.
    connection: Connection,
}

/// Room of a single [`Session`].
#[derive(Debug, Default)]
struct Room {
    /// Live client connection, if any.
    client: Option<Peer>,

    /// Live professional connection, if any.
    professional: Option<Peer>,
}

impl Room {
    /// Returns the slot of the provided [`Role`].
    const fn slot(&self, role: Role) -> &Option<Peer> {
        match role {
            Role::Client => &self.client,
            Role::Professional => &self.professional,
        }
    }

    /// Returns the mutable slot of the provided [`Role`].
    fn slot_mut(&mut self, role: Role) -> &mut Option<Peer> {
        match role {
            Role::Client => &mut self.client,
            Role::Professional => &mut self.professional,
        }
    }

    /// Returns whether no connection is live in this [`Room`].
    const fn is_vacant(&self) -> bool {
        self.client.is_none() && self.professional.is_none()
    }
}

/// Single live connection within a [`Room`].
#[derive(Debug)]
struct Peer {
    /// ID of this connection.
    connection: Connection,

    /// Sender delivering room traffic to this connection.
    sender: mpsc::UnboundedSender<Outbound>,
}

/// ID of a single live connection.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
struct Connection(Uuid);

impl Connection {
    /// Creates a new random [`Connection`] ID.
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Frame delivered to a live room connection.
#[derive(Clone, Debug)]
pub enum Outbound {
    /// [`Message`] recorded by the counterpart.
    Message(Message),

    /// Transient signal relayed from the counterpart verbatim.
    Signal {
        /// [`Role`] the signal originates from.
        from: Role,

        /// Opaque signal payload.
        payload: serde_json::Value,
    },

    /// Room was closed and no further traffic follows.
    Closed {
        /// Terminal [`Status`] the [`Session`] was closed in.
        status: Status,
    },

    /// Connection was replaced by a newer join of the same [`Role`].
    Replaced,

    /// Frame sent by this very connection was rejected.
    Rejected(Rejection),
}

/// Reason a frame was rejected instead of relayed.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Rejection {
    /// [`Session`] accepts no more traffic.
    #[display("session is closed")]
    SessionClosed,

    /// Connection is not allowed to send such a frame.
    #[display("not allowed")]
    Unauthorized,

    /// Frame could not be understood.
    #[display("malformed frame")]
    Malformed,

    /// Frame could not be processed.
    #[display("internal error")]
    Internal,
}
