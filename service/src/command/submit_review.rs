//! [`Command`] for submitting a client [`Review`] of a [`Session`].

use common::{
    operations::{By, Insert, Select},
    DateTime,
};
use derive_more::{Display, Error};
use tracerr::Traced;

use crate::{
    domain::{
        identity::Role,
        review::{Comment, Rating},
        session::{self, Status},
        Identity, Review, Session,
    },
    infra::{storage, Storage},
    Service,
};

use super::Command;

/// [`Command`] for submitting the anonymous client [`Review`] of a closed
/// [`Session`].
///
/// Only the bound client may review, only once, and only once the
/// [`Session`] has run out or was deliberately ended. A cancelled booking
/// was never consulted on, so it cannot be reviewed.
#[derive(Clone, Debug)]
pub struct SubmitReview {
    /// ID of the [`Session`] being reviewed.
    pub session_id: session::Id,

    /// Proven [`Identity`] of the reviewing client.
    pub identity: Identity,

    /// Star [`Rating`] given to the consultation.
    pub rating: Rating,

    /// Optional free-form [`Comment`].
    pub comment: Option<Comment>,
}

impl<St, Gw, Dir> Command<SubmitReview> for Service<St, Gw, Dir>
where
    St: Storage<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<storage::Error>,
        > + Storage<Insert<Review>, Ok = (), Err = Traced<storage::Error>>,
{
    type Ok = Review;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: SubmitReview) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SubmitReview {
            session_id,
            identity,
            rating,
            comment,
        } = cmd;

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
        if identity.role() != Role::Client {
            return Err(tracerr::new!(E::NotClient));
        }
        let now = DateTime::now();
        match session.status_at(now) {
            Status::Expired | Status::Ended => {}
            s @ (Status::Pending | Status::Active | Status::Cancelled) => {
                return Err(tracerr::new!(E::NotReviewable(s)));
            }
        }

        let review = Review {
            session_id,
            rating,
            comment,
            created_at: now.coerce(),
        };
        self.storage()
            .execute(Insert(review.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(review)
    }
}

/// Error of [`SubmitReview`] [`Command`] execution.
#[derive(Debug, Display, Error)]
pub enum ExecutionError {
    /// [`Session`] has a [`Review`] already.
    #[display("`Session(id: {_0})` is reviewed already")]
    AlreadyReviewed(#[error(not(source))] session::Id),

    /// [`Identity`] is a party, but not the reviewing client.
    #[display("only the client side may leave a review")]
    NotClient,

    /// [`Identity`] is not a party of the [`Session`].
    #[display("not a party of `Session(id: {_0})`")]
    NotParty(#[error(not(source))] session::Id),

    /// [`Session`] is not in a reviewable [`Status`] yet.
    #[display("`Session` is `{_0}`, so cannot be reviewed")]
    NotReviewable(#[error(not(source))] Status),

    /// [`Session`] with the provided ID does not exist.
    #[display("`Session(id: {_0})` does not exist")]
    SessionNotExists(#[error(not(source))] session::Id),

    /// [`Storage`] error.
    #[display("`Storage` operation failed: {_0}")]
    Storage(storage::Error),
}

impl From<storage::Error> for ExecutionError {
    fn from(e: storage::Error) -> Self {
        match e {
            storage::Error::DuplicateReview(id) => Self::AlreadyReviewed(id),
            e @ (storage::Error::DuplicateSession(_)
            | storage::Error::DuplicateReference(_)
            | storage::Error::SessionNotFound(_)
            | storage::Error::StaleWrite(_)) => Self::Storage(e),
        }
    }
}

#[cfg(test)]
mod spec {
    use common::{operations::Insert, DateTime};

    use crate::{
        command::Command as _,
        domain::{
            review::{Comment, Rating},
            session::EndedBy,
        },
        harness,
    };

    use super::{ExecutionError, SubmitReview};

    #[tokio::test]
    async fn client_reviews_an_ended_session_once() {
        let service = harness::service();
        let mut session = harness::booked("PS-REV-1");
        let now = DateTime::now();
        assert!(session.activate(now).unwrap());
        assert!(session.terminate(now, EndedBy::Client));
        let session_id = session.id;
        let identity = harness::client(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let review = service
            .execute(SubmitReview {
                session_id,
                identity: identity.clone(),
                rating: Rating::new(5).unwrap(),
                comment: Comment::new("clear and patient"),
            })
            .await
            .unwrap();
        assert_eq!(review.rating.get(), 5);

        let err = service
            .execute(SubmitReview {
                session_id,
                identity,
                rating: Rating::new(1).unwrap(),
                comment: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::AlreadyReviewed(id) if *id == session_id,
        ));
    }

    #[tokio::test]
    async fn running_session_cannot_be_reviewed_yet() {
        let service = harness::service();
        let mut session = harness::booked("PS-REV-2");
        assert!(session.activate(DateTime::now()).unwrap());
        let session_id = session.id;
        let identity = harness::client(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let err = service
            .execute(SubmitReview {
                session_id,
                identity,
                rating: Rating::new(4).unwrap(),
                comment: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::NotReviewable(_),
        ));
    }

    #[tokio::test]
    async fn professional_cannot_review_their_own_session() {
        let service = harness::service();
        let mut session = harness::booked("PS-REV-3");
        let now = DateTime::now();
        assert!(session.activate(now).unwrap());
        assert!(session.terminate(now, EndedBy::Professional));
        let session_id = session.id;
        let identity = harness::staff(&session);
        service.storage().execute(Insert(session)).await.unwrap();

        let err = service
            .execute(SubmitReview {
                session_id,
                identity,
                rating: Rating::new(5).unwrap(),
                comment: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NotClient));
    }
}
