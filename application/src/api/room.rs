//! Live room API definitions.

use axum::{
    extract::{ws, Path, Query},
    response::Response,
    Extension,
};
use futures::{SinkExt as _, StreamExt as _};
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{client, identity::Staff, message, professional, session, Identity, Role},
    query, room,
};
use tokio::sync::mpsc;
use tracing as log;

use crate::{api, define_error, AsError, Error, Service};

/// Maximum size of an accepted WebSocket frame, in bytes.
///
/// Caps well above the largest recordable [`message::Content`], so only
/// abusive traffic is cut off.
const MAX_FRAME_SIZE: usize = 16 * 1024;

/// Credentials identifying the joining party.
///
/// Browsers cannot attach headers to a WebSocket handshake, so the
/// credentials travel as query parameters instead.
#[derive(Debug, Deserialize)]
pub struct JoinParams {
    /// Bearer token of the anonymous client.
    pub token: Option<String>,

    /// ID of the professional authenticated upstream.
    pub professional_id: Option<professional::Id>,
}

/// Joins the live room of the identified `Session` over a WebSocket.
///
/// Both authorization and the open-state check happen before the handshake
/// is upgraded, so an uninvolved or late caller never gets a socket at all.
/// A newer join replaces an older live connection of the same role.
///
/// # Errors
///
/// Possible error codes:
/// - `AUTHORIZATION_REQUIRED` - no credentials were provided;
/// - `INVALID_OR_EXPIRED_TOKEN` - provided client token doesn't verify;
/// - `NOT_FOUND` - no `Session` with the provided ID exists;
/// - `UNAUTHORIZED` - caller is not a party of the `Session`;
/// - `SESSION_CLOSED` - the `Session` accepts no more traffic.
pub async fn join(
    Extension(service): Extension<Service>,
    Path(session_id): Path<session::Id>,
    Query(params): Query<JoinParams>,
    upgrade: ws::WebSocketUpgrade,
) -> Result<Response, Error> {
    let JoinParams {
        token,
        professional_id,
    } = params;

    let identity = match (token, professional_id) {
        (Some(token), _) => {
            #[expect(unsafe_code, reason = "verified by `AuthorizeClient`")]
            let token = unsafe { client::Token::new_unchecked(token) };
            service
                .execute(command::AuthorizeClient { token })
                .await
                .map(Identity::Client)
                .map_err(AsError::into_error)?
        }
        (None, Some(professional_id)) => {
            Identity::Staff(Staff { professional_id })
        }
        (None, None) => return Err(JoinError::CredentialsRequired.into()),
    };

    let session = service
        .execute(query::session::Open(session_id))
        .await
        .map_err(AsError::into_error)?;
    if !identity.authorizes(&session) {
        return Err(api::PrivilegeError::NotParty.into());
    }

    Ok(upgrade
        .max_frame_size(MAX_FRAME_SIZE)
        .max_message_size(MAX_FRAME_SIZE)
        .on_upgrade(move |socket| serve(service, session_id, identity, socket)))
}

/// Serves an upgraded room connection until either side hangs up.
async fn serve(
    service: Service,
    session_id: session::Id,
    identity: Identity,
    socket: ws::WebSocket,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<room::Outbound>();
    let attachment = service.rooms().join(session_id, identity.role(), tx.clone());

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(outbound) = outbound else {
                    break;
                };
                let last = matches!(
                    outbound,
                    room::Outbound::Closed { .. } | room::Outbound::Replaced,
                );
                match serde_json::to_string(&Frame::from(outbound)) {
                    Ok(text) => {
                        if sink.send(ws::Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::error!("failed to serialize an outbound frame: {e}");
                    }
                }
                if last {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(ws::Message::Text(text))) => {
                        handle(&service, &attachment, &identity, &tx, &text)
                            .await;
                    }
                    Some(Ok(ws::Message::Close(_))) | Some(Err(_)) | None => {
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    service.rooms().leave(&attachment);
}

/// Handles a single inbound frame of a served room connection.
///
/// Delivery failures are reported back on the connection's own sender, so
/// the counterpart never observes them.
async fn handle(
    service: &Service,
    attachment: &room::Attachment,
    identity: &Identity,
    tx: &mpsc::UnboundedSender<room::Outbound>,
    text: &str,
) {
    let Ok(inbound) = serde_json::from_str::<Inbound>(text) else {
        _ = tx.send(room::Outbound::Rejected(room::Rejection::Malformed));
        return;
    };

    match inbound {
        Inbound::Message { content } => {
            let Some(content) = message::Content::new(content) else {
                _ = tx.send(room::Outbound::Rejected(
                    room::Rejection::Malformed,
                ));
                return;
            };
            match service
                .execute(command::RecordMessage {
                    session_id: attachment.session_id,
                    identity: identity.clone(),
                    content,
                })
                .await
            {
                Ok(recorded) => {
                    _ = service
                        .rooms()
                        .relay(attachment, room::Outbound::Message(recorded));
                }
                Err(e) => {
                    use command::record_message::ExecutionError as E;

                    let rejection = match e.as_ref() {
                        E::SessionClosed(_) | E::SessionNotExists(_) => {
                            room::Rejection::SessionClosed
                        }
                        E::NotParty(_) => room::Rejection::Unauthorized,
                        E::StaleSession(_) | E::Storage(_) => {
                            log::error!("failed to record a `Message`: {e}");
                            room::Rejection::Internal
                        }
                    };
                    _ = tx.send(room::Outbound::Rejected(rejection));
                }
            }
        }
        Inbound::Signal { payload } => {
            match service
                .execute(query::session::Open(attachment.session_id))
                .await
            {
                Ok(_) => {
                    _ = service.rooms().relay(
                        attachment,
                        room::Outbound::Signal {
                            from: attachment.role,
                            payload,
                        },
                    );
                }
                Err(e) => {
                    use query::session::OpenError as E;

                    let rejection = match e.as_ref() {
                        E::SessionClosed(_) | E::SessionNotExists(_) => {
                            room::Rejection::SessionClosed
                        }
                        E::Storage(_) => {
                            log::error!(
                                "failed to check a `Session` before \
                                 relaying a signal: {e}",
                            );
                            room::Rejection::Internal
                        }
                    };
                    _ = tx.send(room::Outbound::Rejected(rejection));
                }
            }
        }
    }
}

/// Party-to-server frame of the room protocol.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Inbound {
    /// Chat message to record and relay.
    Message {
        /// Text content of the message.
        content: String,
    },

    /// Transient signal to relay to the counterpart verbatim.
    Signal {
        /// Opaque signal payload.
        payload: serde_json::Value,
    },
}

/// Server-to-party frame of the room protocol.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Frame {
    /// Chat message recorded by the counterpart.
    Message {
        /// Recorded message.
        message: super::message::Message,
    },

    /// Transient signal relayed from the counterpart.
    Signal {
        /// Role the signal originates from.
        from: Role,

        /// Opaque signal payload.
        payload: serde_json::Value,
    },

    /// Room was closed and no further traffic follows.
    Closed {
        /// Terminal status the `Session` was closed in.
        status: session::Status,
    },

    /// Connection was replaced by a newer join of the same role.
    Replaced,

    /// Frame sent by this very connection was rejected.
    Rejected {
        /// Human-readable reason of the rejection.
        reason: String,
    },
}

impl From<room::Outbound> for Frame {
    fn from(outbound: room::Outbound) -> Self {
        match outbound {
            room::Outbound::Message(message) => Self::Message {
                message: message.into(),
            },
            room::Outbound::Signal { from, payload } => {
                Self::Signal { from, payload }
            }
            room::Outbound::Closed { status } => Self::Closed { status },
            room::Outbound::Replaced => Self::Replaced,
            room::Outbound::Rejected(rejection) => Self::Rejected {
                reason: rejection.to_string(),
            },
        }
    }
}

define_error! {
    enum JoinError {
        #[code = "AUTHORIZATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Either a client token or a professional ID is required"]
        CredentialsRequired,
    }
}

impl AsError for query::session::OpenError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "SESSION_CLOSED"]
                #[status = GONE]
                #[message = "`Session` is closed and accepts no traffic"]
                Closed,
            }
        }

        match self {
            Self::Storage(e) => e.try_as_error(),
            Self::SessionNotExists(_) => {
                Some(api::SessionError::NotExists.into())
            }
            Self::SessionClosed(_) => Some(Error::Closed.into()),
        }
    }
}
