//! [`Professional`] notification integration.

use std::convert::Infallible;

use common::operations::Perform;
use derive_more::{Display, Error as StdError};
use tokio::sync::broadcast;
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::{Message, Professional};
use crate::{
    domain::{
        identity::Role,
        session::{self, Status},
    },
    event::Event,
};

/// Notification operation.
///
/// Notifications are fire-and-forget nudges towards the [`Professional`]
/// side (the anonymous client has no out-of-band address by design), so
/// failures are logged and never fail the transition that caused them.
pub use common::Handler as Notifier;

/// Out-of-band notice to the [`Professional`] side of a [`Session`].
#[derive(Clone, Debug)]
pub enum Notice {
    /// [`Session`] was booked and waits to be engaged.
    SessionReady {
        /// ID of the booked [`Session`].
        session_id: session::Id,
    },

    /// [`Session`] was extended by its client.
    SessionExtended {
        /// ID of the extended [`Session`].
        session_id: session::Id,

        /// New expiry instant of the [`Session`].
        expires_at: session::ExpirationDateTime,
    },

    /// New [`Message`] awaits the receiving party.
    MessageReceived {
        /// ID of the [`Session`] the [`Message`] was recorded in.
        session_id: session::Id,

        /// [`Role`] the [`Message`] is addressed to.
        to: Role,
    },

    /// [`Session`] was closed.
    SessionClosed {
        /// ID of the closed [`Session`].
        session_id: session::Id,

        /// Terminal [`Status`] the [`Session`] was closed in.
        status: Status,
    },
}

impl Notice {
    /// Derives the [`Notice`] announcing the provided [`Event`], if the
    /// [`Event`] warrants one.
    fn from_event(event: &Event) -> Option<Self> {
        match *event {
            Event::Booked { session_id } => {
                Some(Self::SessionReady { session_id })
            }
            Event::Extended {
                session_id,
                expires_at,
            } => Some(Self::SessionExtended {
                session_id,
                expires_at,
            }),
            Event::MessageRecorded { session_id, sender } => {
                Some(Self::MessageReceived {
                    session_id,
                    to: sender.counterpart(),
                })
            }
            Event::Ended { session_id, .. } => Some(Self::SessionClosed {
                session_id,
                status: Status::Ended,
            }),
            Event::Expired { session_id } => Some(Self::SessionClosed {
                session_id,
                status: Status::Expired,
            }),
            Event::Cancelled { session_id } => Some(Self::SessionClosed {
                session_id,
                status: Status::Cancelled,
            }),
            Event::Activated { .. } => None,
        }
    }
}

/// [`Notifier`] writing every [`Notice`] to the log.
///
/// Stands in for a real delivery channel (email, push) which is out of the
/// session engine's hands.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Notifier<Perform<Notice>> for Log {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(notice): Perform<Notice>,
    ) -> Result<Self::Ok, Self::Err> {
        match notice {
            Notice::SessionReady { session_id } => {
                log::info!(%session_id, "session booked and ready");
            }
            Notice::SessionExtended {
                session_id,
                expires_at,
            } => {
                log::info!(
                    %session_id,
                    expires_at = expires_at.to_rfc3339(),
                    "session extended",
                );
            }
            Notice::MessageReceived { session_id, to } => {
                log::info!(%session_id, %to, "new message");
            }
            Notice::SessionClosed { session_id, status } => {
                log::info!(%session_id, %status, "session closed");
            }
        }
        Ok(())
    }
}

/// Relays published [`Event`]s into [`Notice`]s of the provided
/// [`Notifier`], until the event channel closes.
///
/// Delivery failures are logged and swallowed: a notification is never worth
/// failing or retrying a committed transition for.
pub async fn relay<Nt>(
    notifier: Nt,
    mut events: broadcast::Receiver<Event>,
) -> Result<(), Infallible>
where
    Nt: Notifier<Perform<Notice>, Ok = (), Err: std::error::Error>,
{
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(notice) = Notice::from_event(&event) else {
                    continue;
                };
                _ = notifier.execute(Perform(notice)).await.map_err(|e| {
                    log::warn!("cannot deliver notice: {e}");
                });
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("notification relay lagged, {skipped} events lost");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

/// [`Notifier`] error.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {}
