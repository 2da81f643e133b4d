//! [`Query`] collection related to [`Message`]s of a [`Session`].

use common::operations::{By, Select};
use derive_more::{Display, Error as StdError, From};
use tracerr::Traced;

use crate::{
    domain::{session, Identity, Message, Session},
    infra::{storage, Storage},
    Service,
};

use super::Query;

/// Queries the full [`Message`] history of a [`Session`], as one of its
/// parties.
#[derive(Clone, Debug)]
pub struct History {
    /// ID of the [`Session`] to read.
    pub session_id: session::Id,

    /// [`Identity`] reading the history.
    pub identity: Identity,
}

impl<St, Gw, Dir> Query<History> for Service<St, Gw, Dir>
where
    St: Storage<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<storage::Error>,
        > + Storage<
            Select<By<Vec<Message>, session::Id>>,
            Ok = Vec<Message>,
            Err = Traced<storage::Error>,
        >,
{
    type Ok = Vec<Message>;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, query: History) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let History {
            session_id,
            identity,
        } = query;

        let session = self
            .storage()
            .execute(Select(By::<Option<Session>, _>::new(session_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SessionNotExists(session_id))
            .map_err(tracerr::wrap!())?;

        if !identity.authorizes(&session) {
            return Err(tracerr::new!(E::NotParty(session_id)));
        }

        self.storage()
            .execute(Select(By::<Vec<Message>, _>::new(session_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`History`] [`Query`] execution.
#[derive(Debug, Display, From, StdError)]
pub enum ExecutionError {
    /// [`Storage`] error.
    #[display("`Storage` operation failed: {_0}")]
    #[from]
    Storage(storage::Error),

    /// [`Session`] with the provided ID does not exist.
    #[display("`Session(id: {_0})` does not exist")]
    SessionNotExists(#[error(not(source))] session::Id),

    /// Asking [`Identity`] is not a party of the [`Session`].
    #[display("identity is not a party of `Session(id: {_0})`")]
    NotParty(#[error(not(source))] session::Id),
}
