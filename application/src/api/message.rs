//! Chat history API definitions.

use axum::{extract::Path, Extension, Json};
use serde::Serialize;
use service::{
    command::{self, Command as _},
    domain::{self, message, session, Role},
    query,
};

use crate::{api, AsError, Auth, Error, Service};

/// Representation of a [`domain::Message`] exposed to the parties.
#[derive(Debug, Serialize)]
pub struct Message {
    /// ID of the `Message`.
    pub id: message::Id,

    /// Role of the sending party.
    pub sender: Role,

    /// Displayed handle of the sending party.
    pub sender_handle: message::SenderHandle,

    /// Text content of the `Message`.
    pub content: message::Content,

    /// [RFC 3339] timestamp of when the `Message` was recorded.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub sent_at: String,

    /// Whether the receiving party has read the `Message`.
    pub read_by_recipient: bool,
}

impl From<domain::Message> for Message {
    fn from(message: domain::Message) -> Self {
        let domain::Message {
            id,
            session_id: _,
            sender,
            sender_handle,
            content,
            sent_at,
            read_by_recipient,
        } = message;

        Self {
            id,
            sender,
            sender_handle,
            content,
            sent_at: sent_at.to_rfc3339(),
            read_by_recipient,
        }
    }
}

/// Returns the full chat history of the identified `Session`, oldest first.
///
/// A fetch by the professional doubles as a read receipt: the unread flag
/// is cleared before the history is read.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_FOUND` - no `Session` with the provided ID exists;
/// - `UNAUTHORIZED` - caller is not a party of the `Session`;
/// - `INVALID_TRANSITION` - read receipt lost a concurrent update race.
pub async fn history(
    Extension(service): Extension<Service>,
    Path(session_id): Path<session::Id>,
    Auth(identity): Auth,
) -> Result<Json<Vec<Message>>, Error> {
    if identity.role() == Role::Professional {
        service
            .execute(command::MarkMessagesRead {
                session_id,
                identity: identity.clone(),
            })
            .await
            .map_err(AsError::into_error)?;
    }

    service
        .execute(query::message::History {
            session_id,
            identity,
        })
        .await
        .map(|messages| Json(messages.into_iter().map(Into::into).collect()))
        .map_err(AsError::into_error)
}

impl AsError for query::message::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Storage(e) => e.try_as_error(),
            Self::SessionNotExists(_) => {
                Some(api::SessionError::NotExists.into())
            }
            Self::NotParty(_) => Some(api::PrivilegeError::NotParty.into()),
        }
    }
}

impl AsError for command::mark_messages_read::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::NotParty(_) => Some(api::PrivilegeError::NotParty.into()),
            Self::SessionNotExists(_) => {
                Some(api::SessionError::NotExists.into())
            }
            Self::StaleSession(_) => {
                Some(api::TransitionError::Invalid.into())
            }
            Self::Storage(e) => e.try_as_error(),
        }
    }
}
