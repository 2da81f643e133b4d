//! [`Command`] for deliberately ending a [`Session`].

use common::{
    operations::{By, Select, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        identity::Role,
        session::{self, EndedBy},
        Identity, Session,
    },
    event::Event,
    infra::{storage, Storage},
    Service,
};

use super::{commit, Command, CommitError};

/// [`Command`] for deliberately ending a [`Session`] before its clock runs
/// out.
///
/// Either party may end a [`Session`], forfeiting the remaining paid time.
/// Ending an already closed [`Session`] is a no-op, so duplicate requests
/// never fail nor rewrite who closed it first.
#[derive(Clone, Debug)]
pub struct TerminateSession {
    /// ID of the [`Session`] to end.
    pub session_id: session::Id,

    /// Proven [`Identity`] of the ending party.
    pub identity: Identity,
}

impl<St, Gw, Dir> Command<TerminateSession> for Service<St, Gw, Dir>
where
    St: Storage<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<storage::Error>,
        > + Storage<Update<Session>, Ok = Session, Err = Traced<storage::Error>>,
{
    type Ok = Session;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: TerminateSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let TerminateSession {
            session_id,
            identity,
        } = cmd;

        let by = match identity.role() {
            Role::Client => EndedBy::Client,
            Role::Professional => EndedBy::Professional,
        };
        let now = DateTime::now();
        let (session, ended) =
            commit(self.storage(), session_id, |session| {
                if !identity.authorizes(session) {
                    return Err(E::NotParty(session_id));
                }
                Ok(session.terminate(now, by))
            })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        if ended {
            self.publish(Event::Ended { session_id, by });
        }
        Ok(session)
    }
}

/// Error of [`TerminateSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Identity`] is not a party of the [`Session`].
    #[display("not a party of `Session(id: {_0})`")]
    NotParty(#[error(not(source))] session::Id),

    /// [`Session`] with the provided ID does not exist.
    #[display("`Session(id: {_0})` does not exist")]
    SessionNotExists(#[error(not(source))] session::Id),

    /// Concurrent writers kept invalidating the transition.
    #[display("`Session(id: {_0})` kept being updated concurrently")]
    StaleSession(#[error(not(source))] session::Id),

    /// [`Storage`] error.
    #[display("`Storage` operation failed: {_0}")]
    #[from]
    Storage(storage::Error),
}

impl From<CommitError<ExecutionError>> for ExecutionError {
    fn from(e: CommitError<Self>) -> Self {
        match e {
            CommitError::NotFound(id) => Self::SessionNotExists(id),
            CommitError::Rejected(e) => e,
            CommitError::Stale(id) => Self::StaleSession(id),
            CommitError::Storage(e) => e.into(),
        }
    }
}
