//! [`Command`] definition.

pub mod activate_session;
pub mod authorize_client;
pub mod book_session;
pub mod extend_session;
pub mod initiate_booking;
pub mod initiate_extension;
pub mod mark_messages_read;
pub mod record_message;
pub mod submit_review;
pub mod terminate_session;

use common::operations::{By, Select, Update};
use derive_more::{Display, Error};
use tracerr::Traced;

use crate::{
    domain::{client, session, Session},
    infra::{storage, Storage},
};

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    activate_session::ActivateSession, authorize_client::AuthorizeClient,
    book_session::BookSession, extend_session::ExtendSession,
    initiate_booking::InitiateBooking, initiate_extension::InitiateExtension,
    mark_messages_read::MarkMessagesRead, record_message::RecordMessage,
    submit_review::SubmitReview, terminate_session::TerminateSession,
};

/// Reads the identified [`Session`], applies the provided mutation to it,
/// and writes it back.
///
/// A [`storage::Error::StaleWrite`] means another writer committed in
/// between, so the [`Session`] is re-read and the mutation re-applied once.
/// The mutation validates against the fresh state on that second pass, so
/// racing writers resolve into domain errors rather than lost updates.
///
/// Returns the committed [`Session`] alongside the mutation's own output.
pub(crate) async fn commit<St, T, E>(
    storage: &St,
    id: session::Id,
    mut mutate: impl FnMut(&mut Session) -> Result<T, E>,
) -> Result<(Session, T), Traced<CommitError<E>>>
where
    St: Storage<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<storage::Error>,
        > + Storage<Update<Session>, Ok = Session, Err = Traced<storage::Error>>,
{
    let mut retried = false;
    loop {
        let mut session = storage
            .execute(Select(By::<Option<Session>, _>::new(id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> CommitError<E>))?
            .ok_or(CommitError::NotFound(id))
            .map_err(tracerr::wrap!())?;

        let out = mutate(&mut session)
            .map_err(CommitError::Rejected)
            .map_err(tracerr::wrap!())?;

        match storage.execute(Update(session)).await {
            Ok(committed) => return Ok((committed, out)),
            Err(e)
                if matches!(e.as_ref(), storage::Error::StaleWrite(_)) =>
            {
                if retried {
                    return Err(tracerr::new!(CommitError::Stale(id)));
                }
                retried = true;
            }
            Err(e) => {
                return Err(e)
                    .map_err(tracerr::map_from_and_wrap!(=> CommitError<E>));
            }
        }
    }
}

/// Error of [`commit()`]ting a [`Session`] mutation.
#[derive(Debug, Display, Error)]
pub(crate) enum CommitError<E> {
    /// [`Session`] with the provided ID does not exist.
    #[display("`Session(id: {_0})` does not exist")]
    NotFound(#[error(not(source))] session::Id),

    /// Mutation was rejected against the current [`Session`] state.
    #[display("{_0}")]
    Rejected(E),

    /// Concurrent writers kept invalidating the read state, even after the
    /// bounded retry.
    #[display("`Session(id: {_0})` kept being updated concurrently")]
    Stale(#[error(not(source))] session::Id),

    /// [`Storage`] error.
    #[display("`Storage` operation failed: {_0}")]
    Storage(storage::Error),
}

impl<E> From<storage::Error> for CommitError<E> {
    fn from(e: storage::Error) -> Self {
        Self::Storage(e)
    }
}

/// Mints a client [`Token`] carrying the provided [`client::Claims`].
///
/// [`Token`]: client::Token
pub(crate) fn mint_client_token(
    key: &jsonwebtoken::EncodingKey,
    claims: &client::Claims,
) -> Result<client::Token, jsonwebtoken::errors::Error> {
    let token = jsonwebtoken::encode::<client::Claims>(
        &jsonwebtoken::Header::default(),
        claims,
        key,
    )?;
    // SAFETY: `jsonwebtoken::encode` always returns a valid
    //         `client::Token`.
    #[expect(unsafe_code, reason = "invariants are preserved")]
    let token = unsafe { client::Token::new_unchecked(token) };
    Ok(token)
}
