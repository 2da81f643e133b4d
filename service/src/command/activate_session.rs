//! [`Command`] for activating a [`Session`].

use common::{
    operations::{By, Select, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        session::{self, Status},
        Identity, Session,
    },
    event::Event,
    infra::{storage, Storage},
    Service,
};

use super::{commit, Command, CommitError};

/// [`Command`] for activating a [`Session`], starting its paid clock.
///
/// Activation is idempotent: a [`Session`] already running is left as is, so
/// an explicit start racing a first-message activation never restarts the
/// clock.
#[derive(Clone, Debug)]
pub struct ActivateSession {
    /// ID of the [`Session`] to activate.
    pub session_id: session::Id,

    /// Proven [`Identity`] of the activating party.
    pub identity: Identity,
}

impl<St, Gw, Dir> Command<ActivateSession> for Service<St, Gw, Dir>
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
        cmd: ActivateSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ActivateSession {
            session_id,
            identity,
        } = cmd;

        let now = DateTime::now();
        let (session, activated) =
            commit(self.storage(), session_id, |session| {
                if !identity.authorizes(session) {
                    return Err(E::NotParty(session_id));
                }
                session
                    .activate(now)
                    .map_err(|session::ActivationError(s)| {
                        E::InvalidTransition(s)
                    })
            })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        if activated {
            self.publish(Event::Activated { session_id });
        }
        Ok(session)
    }
}

/// Error of [`ActivateSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Session`] cannot be activated out of a terminal [`Status`].
    #[display("`Session` cannot be activated from `{_0}` status")]
    InvalidTransition(#[error(not(source))] Status),

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

#[cfg(test)]
mod spec {
    use common::operations::Insert;

    use crate::{
        command::Command as _,
        domain::{
            identity::{Identity, Staff},
            professional,
            session::Status,
        },
        harness,
    };

    use super::{ActivateSession, ExecutionError};

    #[tokio::test]
    async fn stamps_clock_once_and_stays_idempotent() {
        let service = harness::service();
        let session = harness::booked("PS-ACT-1");
        let session_id = session.id;
        let identity = harness::client(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let activated = service
            .execute(ActivateSession {
                session_id,
                identity: identity.clone(),
            })
            .await
            .unwrap();
        assert_eq!(activated.status, Status::Active);
        let expires_at = activated.expires_at.expect("clock is stamped");

        let again = service
            .execute(ActivateSession {
                session_id,
                identity,
            })
            .await
            .unwrap();
        assert_eq!(again.expires_at, Some(expires_at));
        assert_eq!(again.started_at, activated.started_at);
    }

    #[tokio::test]
    async fn professional_may_activate_too() {
        let service = harness::service();
        let session = harness::booked("PS-ACT-2");
        let session_id = session.id;
        let identity = harness::staff(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let activated = service
            .execute(ActivateSession {
                session_id,
                identity,
            })
            .await
            .unwrap();
        assert_eq!(activated.status, Status::Active);
    }

    #[tokio::test]
    async fn strangers_are_rejected() {
        let service = harness::service();
        let session = harness::booked("PS-ACT-3");
        let session_id = session.id;
        service.storage().execute(Insert(session)).await.unwrap();

        let err = service
            .execute(ActivateSession {
                session_id,
                identity: Identity::Staff(Staff {
                    professional_id: professional::Id::new(),
                }),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotParty(_)));
    }

    #[tokio::test]
    async fn terminal_session_cannot_be_activated() {
        let service = harness::service();
        let mut session = harness::booked("PS-ACT-4");
        let session_id = session.id;
        let identity = harness::client(&session);
        assert!(session.terminate(
            common::DateTime::now(),
            crate::domain::session::EndedBy::Client,
        ));
        service.storage().execute(Insert(session)).await.unwrap();

        let err = service
            .execute(ActivateSession {
                session_id,
                identity,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::InvalidTransition(Status::Ended),
        ));
    }
}
