//! [`Command`] for acknowledging chat [`Message`]s of a [`Session`].

use common::operations::{By, Perform, Select, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::Message;
use crate::{
    domain::{message::MarkRead, session, Identity, Session},
    infra::{storage, Storage},
    Service,
};

use super::{commit, Command, CommitError};

/// [`Command`] for acknowledging all the [`Message`]s addressed to a party
/// of a [`Session`].
///
/// Clears the per-[`Session`] unread marker for the acknowledging side and
/// flips the delivered [`Message`]s to read.
#[derive(Clone, Debug)]
pub struct MarkMessagesRead {
    /// ID of the [`Session`] whose [`Message`]s were read.
    pub session_id: session::Id,

    /// Proven [`Identity`] of the reading party.
    pub identity: Identity,
}

impl<St, Gw, Dir> Command<MarkMessagesRead> for Service<St, Gw, Dir>
where
    St: Storage<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<storage::Error>,
        > + Storage<Update<Session>, Ok = Session, Err = Traced<storage::Error>>
        + Storage<Perform<MarkRead>, Ok = (), Err = Traced<storage::Error>>,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: MarkMessagesRead,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let MarkMessagesRead {
            session_id,
            identity,
        } = cmd;

        let reader = identity.role();
        let (_, ()) = commit(self.storage(), session_id, |session| {
            if !identity.authorizes(session) {
                return Err(E::NotParty(session_id));
            }
            session.note_read(reader);
            Ok(())
        })
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))?;

        self.storage()
            .execute(Perform(MarkRead { session_id, reader }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`MarkMessagesRead`] [`Command`] execution.
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

#[cfg(test)]
mod spec {
    use common::operations::{By, Insert, Select};

    use crate::{
        command::{Command as _, RecordMessage},
        domain::{message::Content, session, Message, Session},
        harness,
    };

    use super::{ExecutionError, MarkMessagesRead};

    #[tokio::test]
    async fn professional_read_clears_the_unread_backlog() {
        let service = harness::service();
        let session = harness::booked("PS-READ-1");
        let session_id = session.id;
        let client = harness::client(&session);
        let staff = harness::staff(&session);
        service.storage().execute(Insert(session)).await.unwrap();
        drop(
            service
                .execute(RecordMessage {
                    session_id,
                    identity: client,
                    content: Content::new("first question").unwrap(),
                })
                .await
                .unwrap(),
        );

        service
            .execute(MarkMessagesRead {
                session_id,
                identity: staff,
            })
            .await
            .unwrap();

        let stored = service
            .storage()
            .execute(Select(By::<Option<Session>, _>::new(session_id)))
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.unread_for_professional);
        let messages = service
            .storage()
            .execute(Select(By::<Vec<Message>, _>::new(session_id)))
            .await
            .unwrap();
        assert!(messages.iter().all(|m| m.read_by_recipient));
    }

    #[tokio::test]
    async fn client_read_leaves_the_professional_backlog_alone() {
        let service = harness::service();
        let session = harness::booked("PS-READ-2");
        let session_id = session.id;
        let client = harness::client(&session);
        service.storage().execute(Insert(session)).await.unwrap();
        drop(
            service
                .execute(RecordMessage {
                    session_id,
                    identity: client.clone(),
                    content: Content::new("still unread").unwrap(),
                })
                .await
                .unwrap(),
        );

        service
            .execute(MarkMessagesRead {
                session_id,
                identity: client,
            })
            .await
            .unwrap();

        let stored = service
            .storage()
            .execute(Select(By::<Option<Session>, _>::new(session_id)))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.unread_for_professional);
    }

    #[tokio::test]
    async fn unknown_session_is_reported() {
        let service = harness::service();
        let session = harness::booked("PS-READ-3");
        let identity = harness::client(&session);

        let err = service
            .execute(MarkMessagesRead {
                session_id: session::Id::new(),
                identity,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::SessionNotExists(_),
        ));
    }
}
