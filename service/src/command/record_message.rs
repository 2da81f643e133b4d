//! [`Command`] for recording a chat [`Message`] in a [`Session`].

use common::{
    operations::{By, Insert, Select, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        message::{self, Content},
        session::{self, DeliveryError, Status},
        Identity, Message, Session,
    },
    event::Event,
    infra::{storage, Storage},
    Service,
};

use super::{commit, Command, CommitError};

/// [`Command`] for recording a chat [`Message`] sent by a party of a
/// [`Session`].
///
/// The first client [`Message`] into a [`Status::Pending`] [`Session`]
/// starts its paid clock, exactly as an explicit [`ActivateSession`] would.
///
/// [`ActivateSession`]: super::ActivateSession
/// [`Status::Pending`]: session::Status::Pending
#[derive(Clone, Debug)]
pub struct RecordMessage {
    /// ID of the [`Session`] the [`Message`] belongs to.
    pub session_id: session::Id,

    /// Proven [`Identity`] of the sending party.
    pub identity: Identity,

    /// [`Content`] of the [`Message`].
    pub content: Content,
}

impl<St, Gw, Dir> Command<RecordMessage> for Service<St, Gw, Dir>
where
    St: Storage<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<storage::Error>,
        > + Storage<Update<Session>, Ok = Session, Err = Traced<storage::Error>>
        + Storage<Insert<Message>, Ok = (), Err = Traced<storage::Error>>,
{
    type Ok = Message;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RecordMessage) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RecordMessage {
            session_id,
            identity,
            content,
        } = cmd;

        let role = identity.role();
        let now = DateTime::now();
        let (_, activated) =
            commit(self.storage(), session_id, |session| {
                if !identity.authorizes(session) {
                    return Err(E::NotParty(session_id));
                }
                session.note_message(now, role).map_err(|e| match e {
                    DeliveryError::Closed(s) => E::SessionClosed(s),
                    DeliveryError::Expired => {
                        E::SessionClosed(Status::Expired)
                    }
                })
            })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let message = Message {
            id: message::Id::new(),
            session_id,
            sender: role,
            sender_handle: match &identity {
                Identity::Client(binding) => (&binding.handle).into(),
                Identity::Staff(staff) => staff.professional_id.into(),
            },
            content,
            sent_at: now.coerce(),
            read_by_recipient: false,
        };
        self.storage()
            .execute(Insert(message.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        if activated {
            self.publish(Event::Activated { session_id });
        }
        self.publish(Event::MessageRecorded {
            session_id,
            sender: role,
        });

        Ok(message)
    }
}

/// Error of [`RecordMessage`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Identity`] is not a party of the [`Session`].
    #[display("not a party of `Session(id: {_0})`")]
    NotParty(#[error(not(source))] session::Id),

    /// [`Session`] doesn't accept [`Message`]s anymore.
    #[display("`Session` is closed as `{_0}`")]
    SessionClosed(#[error(not(source))] Status),

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
    use std::time::Duration;

    use common::{
        operations::{By, Insert, Select},
        DateTime,
    };

    use crate::{
        command::Command as _,
        domain::{
            identity::Role,
            message::Content,
            session::{EndedBy, Status},
            Session,
        },
        event::Event,
        harness,
    };

    use super::{ExecutionError, RecordMessage};

    fn text(s: &str) -> Content {
        Content::new(s).unwrap()
    }

    #[tokio::test]
    async fn first_client_message_starts_the_clock() {
        let service = harness::service();
        let mut events = service.subscribe();
        let session = harness::booked("PS-MSG-1");
        let session_id = session.id;
        let identity = harness::client(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let message = service
            .execute(RecordMessage {
                session_id,
                identity,
                content: text("hello, I need advice"),
            })
            .await
            .unwrap();
        assert_eq!(message.sender, Role::Client);
        assert!(!message.read_by_recipient);

        assert!(matches!(
            events.try_recv().unwrap(),
            Event::Activated { session_id: id } if id == session_id,
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            Event::MessageRecorded { session_id: id, sender: Role::Client }
                if id == session_id,
        ));

        let stored = service
            .storage()
            .execute(Select(By::<Option<Session>, _>::new(session_id)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, Status::Active);
        assert!(stored.unread_for_professional);
    }

    #[tokio::test]
    async fn professional_reply_is_signed_with_their_public_id() {
        let service = harness::service();
        let mut session = harness::booked("PS-MSG-2");
        assert!(session.activate(DateTime::now()).unwrap());
        let session_id = session.id;
        let professional_id = session.professional_id;
        let identity = harness::staff(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let message = service
            .execute(RecordMessage {
                session_id,
                identity,
                content: text("happy to help"),
            })
            .await
            .unwrap();
        assert_eq!(message.sender, Role::Professional);
        assert_eq!(
            AsRef::<str>::as_ref(&message.sender_handle),
            professional_id.to_string(),
        );

        let stored = service
            .storage()
            .execute(Select(By::<Option<Session>, _>::new(session_id)))
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.unread_for_professional);
    }

    #[tokio::test]
    async fn ended_session_rejects_messages() {
        let service = harness::service();
        let mut session = harness::booked("PS-MSG-3");
        let now = DateTime::now();
        assert!(session.activate(now).unwrap());
        assert!(session.terminate(now, EndedBy::Professional));
        let session_id = session.id;
        let identity = harness::client(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let err = service
            .execute(RecordMessage {
                session_id,
                identity,
                content: text("are you still there?"),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::SessionClosed(Status::Ended),
        ));
    }

    #[tokio::test]
    async fn overdue_session_reads_as_expired_before_the_sweep() {
        let service = harness::service();
        let mut session = harness::booked("PS-MSG-4");
        let long_ago = DateTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        assert!(session.activate(long_ago).unwrap());
        let session_id = session.id;
        let identity = harness::client(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let err = service
            .execute(RecordMessage {
                session_id,
                identity,
                content: text("one more question"),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::SessionClosed(Status::Expired),
        ));
    }
}
