//! [`Query`] collection related to a single [`Session`].

use std::time::Duration;

use common::{
    operations::{By, Select},
    DateTime,
};
use derive_more::{Display, Error as StdError, From};
use tracerr::Traced;

use crate::{
    domain::{session, Identity, Session},
    infra::{storage, Storage},
    Service,
};

use super::{Query, StorageQuery};

/// Queries a [`Session`] by its [`session::Id`].
pub type ById = StorageQuery<By<Option<Session>, session::Id>>;

/// Queries a [`Session`] still open for traffic.
///
/// This is the gate every room join and signal relay passes through.
#[derive(Clone, Copy, Debug)]
pub struct Open(pub session::Id);

impl<St, Gw, Dir> Query<Open> for Service<St, Gw, Dir>
where
    St: Storage<
        Select<By<Option<Session>, session::Id>>,
        Ok = Option<Session>,
        Err = Traced<storage::Error>,
    >,
{
    type Ok = Session;
    type Err = Traced<OpenError>;

    async fn execute(&self, query: Open) -> Result<Self::Ok, Self::Err> {
        use OpenError as E;

        let Open(session_id) = query;

        let session = self
            .storage()
            .execute(Select(By::<Option<Session>, _>::new(session_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SessionNotExists(session_id))
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        if session.is_open(now) {
            Ok(session)
        } else {
            Err(tracerr::new!(E::SessionClosed(session.status_at(now))))
        }
    }
}

/// Error of [`Open`] [`Query`] execution.
#[derive(Debug, Display, From, StdError)]
pub enum OpenError {
    /// [`Storage`] error.
    #[display("`Storage` operation failed: {_0}")]
    #[from]
    Storage(storage::Error),

    /// [`Session`] with the provided ID does not exist.
    #[display("`Session(id: {_0})` does not exist")]
    SessionNotExists(#[error(not(source))] session::Id),

    /// [`Session`] is closed and accepts no traffic.
    #[display("`Session` is closed in `{_0}` status")]
    SessionClosed(#[error(not(source))] session::Status),
}

/// Queries the live [`Snapshot`] of a [`Session`], as seen by one of its
/// parties.
#[derive(Clone, Debug)]
pub struct Status {
    /// ID of the [`Session`] to snapshot.
    pub session_id: session::Id,

    /// [`Identity`] asking for the [`Snapshot`].
    pub identity: Identity,
}

/// Live view over a single [`Session`].
///
/// Computed against the wall clock at query time, so an overdue [`Session`]
/// reads as expired with zero time remaining even before the sweeper commits
/// the transition.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot {
    /// Observed [`session::Status`].
    pub status: session::Status,

    /// Wall-clock time remaining on the [`Session`] clock.
    pub remaining: Duration,

    /// Whether the [`Session`] is usable right now.
    pub is_active: bool,

    /// Instant the [`Session`] clock runs out at, once activated.
    pub expires_at: Option<session::ExpirationDateTime>,

    /// Number of extensions applied so far.
    pub extensions: usize,

    /// Whether client messages await the professional.
    pub unread_for_professional: bool,
}

impl<St, Gw, Dir> Query<Status> for Service<St, Gw, Dir>
where
    St: Storage<
        Select<By<Option<Session>, session::Id>>,
        Ok = Option<Session>,
        Err = Traced<storage::Error>,
    >,
{
    type Ok = Snapshot;
    type Err = Traced<StatusError>;

    async fn execute(&self, query: Status) -> Result<Self::Ok, Self::Err> {
        use StatusError as E;

        let Status {
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

        let now = DateTime::now();
        Ok(Snapshot {
            status: session.status_at(now),
            remaining: session.remaining(now),
            is_active: session.is_active(now),
            expires_at: session.expires_at,
            extensions: session.extensions.len(),
            unread_for_professional: session.unread_for_professional,
        })
    }
}

/// Error of [`Status`] [`Query`] execution.
#[derive(Debug, Display, From, StdError)]
pub enum StatusError {
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

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{operations::Insert, DateTime};

    use crate::{domain::session, harness};

    use super::{Open, OpenError, Query as _, Status, StatusError};

    #[tokio::test]
    async fn snapshot_tracks_the_wall_clock() {
        let service = harness::service();
        let mut session = harness::booked("PS-SNAP-1");
        assert!(session.activate(DateTime::now()).unwrap());
        let session_id = session.id;
        let client = harness::client(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let snapshot = service
            .execute(Status {
                session_id,
                identity: client,
            })
            .await
            .unwrap();

        assert_eq!(snapshot.status, session::Status::Active);
        assert!(snapshot.is_active);
        assert!(snapshot.remaining > Duration::ZERO);
        assert!(snapshot.remaining <= Duration::from_secs(3_600));
        assert_eq!(snapshot.extensions, 0);
        assert!(!snapshot.unread_for_professional);
    }

    #[tokio::test]
    async fn overdue_session_reads_expired_before_the_sweep() {
        let service = harness::service();
        let mut session = harness::booked("PS-SNAP-2");
        let long_ago = DateTime::now() - Duration::from_secs(7_200);
        assert!(session.activate(long_ago).unwrap());
        let session_id = session.id;
        let staff = harness::staff(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let snapshot = service
            .execute(Status {
                session_id,
                identity: staff,
            })
            .await
            .unwrap();

        assert_eq!(snapshot.status, session::Status::Expired);
        assert!(!snapshot.is_active);
        assert_eq!(snapshot.remaining, Duration::ZERO);
    }

    #[tokio::test]
    async fn stranger_cannot_snapshot() {
        let service = harness::service();
        let own = harness::booked("PS-SNAP-3");
        let foreign = harness::booked("PS-SNAP-4");
        let foreign_id = foreign.id;
        let identity = harness::client(&own);
        service.storage().execute(Insert(own)).await.unwrap();
        service.storage().execute(Insert(foreign)).await.unwrap();

        let err = service
            .execute(Status {
                session_id: foreign_id,
                identity,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), StatusError::NotParty(_)));
    }

    #[tokio::test]
    async fn open_gate_rejects_closed_sessions() {
        let service = harness::service();
        let pending = harness::booked("PS-SNAP-5");
        let pending_id = pending.id;
        let mut ended = harness::booked("PS-SNAP-6");
        let now = DateTime::now();
        assert!(ended.activate(now).unwrap());
        assert!(ended.terminate(now, session::EndedBy::Client));
        let ended_id = ended.id;
        service.storage().execute(Insert(pending)).await.unwrap();
        service.storage().execute(Insert(ended)).await.unwrap();

        assert!(service.execute(Open(pending_id)).await.is_ok());

        let err = service.execute(Open(ended_id)).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            OpenError::SessionClosed(session::Status::Ended),
        ));
    }
}
