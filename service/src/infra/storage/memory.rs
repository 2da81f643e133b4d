//! In-memory [`Storage`] implementation.

use std::sync::Arc;

use common::operations::{By, Insert, Perform, Select, Update};
use dashmap::{mapref::entry::Entry, DashMap};
use tracerr::Traced;

use crate::{
    domain::{message, payment, session, Message, Review, Session},
    read,
};

use super::{Error, Storage};

/// In-memory [`Storage`] backed by sharded concurrent maps.
///
/// Cheap to [`Clone`]: every clone shares the same underlying tables.
#[derive(Clone, Debug, Default)]
pub struct Memory(Arc<Tables>);

/// Tables of a [`Memory`] storage.
#[derive(Debug, Default)]
struct Tables {
    /// [`Session`]s by their ID.
    sessions: DashMap<session::Id, Session>,

    /// Idempotency index of every [`payment::Reference`] ever applied,
    /// pointing at the [`Session`] it paid for.
    references: DashMap<payment::Reference, session::Id>,

    /// [`Message`]s per [`Session`], in arrival order.
    messages: DashMap<session::Id, Vec<Message>>,

    /// [`Review`]s by the reviewed [`Session`].
    reviews: DashMap<session::Id, Review>,
}

impl Storage<Insert<Session>> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(session): Insert<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        match self.0.references.entry(session.payment_reference.clone()) {
            Entry::Occupied(_) => {
                return Err(tracerr::new!(Error::DuplicateReference(
                    session.payment_reference,
                )));
            }
            Entry::Vacant(e) => {
                _ = e.insert(session.id);
            }
        }
        match self.0.sessions.entry(session.id) {
            Entry::Occupied(_) => {
                _ = self.0.references.remove(&session.payment_reference);
                Err(tracerr::new!(Error::DuplicateSession(session.id)))
            }
            Entry::Vacant(e) => {
                _ = e.insert(session);
                Ok(())
            }
        }
    }
}

impl Storage<Update<Session>> for Memory {
    type Ok = Session;
    type Err = Traced<Error>;

    /// Replaces the stored [`Session`] with the provided one, provided the
    /// caller has seen the latest stored [`session::Revision`].
    ///
    /// Returns the [`Session`] as stored, with its revision bumped.
    async fn execute(
        &self,
        Update(session): Update<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        let Some(mut stored) = self.0.sessions.get_mut(&session.id) else {
            return Err(tracerr::new!(Error::SessionNotFound(session.id)));
        };
        if stored.revision != session.revision {
            return Err(tracerr::new!(Error::StaleWrite(session.id)));
        }

        let mut registered = Vec::new();
        for extension in &session.extensions {
            match self.0.references.entry(extension.reference.clone()) {
                Entry::Occupied(e) if *e.get() == session.id => {}
                Entry::Occupied(_) => {
                    for reference in &registered {
                        _ = self.0.references.remove(reference);
                    }
                    return Err(tracerr::new!(Error::DuplicateReference(
                        extension.reference.clone(),
                    )));
                }
                Entry::Vacant(e) => {
                    _ = e.insert(session.id);
                    registered.push(extension.reference.clone());
                }
            }
        }

        let session = Session {
            revision: session.revision.bumped(),
            ..session
        };
        stored.clone_from(&session);
        Ok(session)
    }
}

impl Storage<Select<By<Option<Session>, session::Id>>> for Memory {
    type Ok = Option<Session>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .0
            .sessions
            .get(&by.into_inner())
            .map(|s| s.value().clone()))
    }
}

impl Storage<Select<By<Vec<Session>, read::session::TimedOut>>> for Memory {
    type Ok = Vec<Session>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Session>, read::session::TimedOut>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::session::TimedOut(now) = by.into_inner();
        Ok(self
            .0
            .sessions
            .iter()
            .filter(|s| {
                s.status == session::Status::Active && s.is_overdue(now)
            })
            .map(|s| s.value().clone())
            .collect())
    }
}

impl Storage<Select<By<Vec<Session>, read::session::StaleBooking>>>
    for Memory
{
    type Ok = Vec<Session>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Session>, read::session::StaleBooking>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::session::StaleBooking(now) = by.into_inner();
        Ok(self
            .0
            .sessions
            .iter()
            .filter(|s| {
                s.status == session::Status::Pending
                    && now.coerce() > s.booking_expires_at
            })
            .map(|s| s.value().clone())
            .collect())
    }
}

impl Storage<Insert<Message>> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(message): Insert<Message>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .messages
            .entry(message.session_id)
            .or_default()
            .push(message);
        Ok(())
    }
}

impl Storage<Select<By<Vec<Message>, session::Id>>> for Memory {
    type Ok = Vec<Message>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Message>, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .0
            .messages
            .get(&by.into_inner())
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }
}

impl Storage<Perform<message::MarkRead>> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Perform(mark): Perform<message::MarkRead>,
    ) -> Result<Self::Ok, Self::Err> {
        if let Some(mut messages) = self.0.messages.get_mut(&mark.session_id)
        {
            for message in
                messages.iter_mut().filter(|m| m.sender != mark.reader)
            {
                message.read_by_recipient = true;
            }
        }
        Ok(())
    }
}

impl Storage<Insert<Review>> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Insert(review): Insert<Review>,
    ) -> Result<Self::Ok, Self::Err> {
        match self.0.reviews.entry(review.session_id) {
            Entry::Occupied(_) => Err(tracerr::new!(Error::DuplicateReview(
                review.session_id,
            ))),
            Entry::Vacant(e) => {
                _ = e.insert(review);
                Ok(())
            }
        }
    }
}

impl Storage<Select<By<Option<Review>, session::Id>>> for Memory {
    type Ok = Option<Review>;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Review>, session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self
            .0
            .reviews
            .get(&by.into_inner())
            .map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Insert, Perform, Select, Update},
        DateTime, Hours, Money,
    };

    use crate::{
        domain::{
            client, identity::Role, message, payment, professional, review,
            session, Message, Review, Session,
        },
        read,
    };

    use super::{Error, Memory, Storage as _};

    fn ngn(amount: u64) -> Money {
        Money {
            amount: amount.into(),
            currency: common::money::Currency::Ngn,
        }
    }

    fn booked(reference: &str) -> (Session, DateTime) {
        let now = DateTime::UNIX_EPOCH + Duration::from_secs(5_000_000);
        let session = Session {
            id: session::Id::new(),
            professional_id: professional::Id::new(),
            client_handle: client::Handle::generate(),
            price_per_hour: ngn(500),
            hours: Hours::ONE,
            total_paid: ngn(500),
            payment_reference: payment::Reference::new(reference).unwrap(),
            extensions: Vec::new(),
            created_at: now.coerce(),
            booking_expires_at: (now + Duration::from_secs(24 * 3_600))
                .coerce(),
            started_at: None,
            expires_at: None,
            last_message_at: None,
            ended_at: None,
            ended_by: None,
            unread_for_professional: false,
            status: session::Status::Pending,
            revision: session::Revision::default(),
        };
        (session, now)
    }

    fn chat(session: &Session, sender: Role, text: &str) -> Message {
        Message {
            id: message::Id::new(),
            session_id: session.id,
            sender,
            sender_handle: match sender {
                Role::Client => (&session.client_handle).into(),
                Role::Professional => session.professional_id.into(),
            },
            content: message::Content::new(text).unwrap(),
            sent_at: DateTime::now().coerce(),
            read_by_recipient: false,
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_payment_reference() {
        let storage = Memory::default();
        let (first, _) = booked("PS-1");
        let (second, _) = booked("PS-1");

        storage.execute(Insert(first)).await.unwrap();

        let err = storage.execute(Insert(second)).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            Error::DuplicateReference(_),
        ));
    }

    #[tokio::test]
    async fn update_rejects_stale_revision() {
        let storage = Memory::default();
        let (session, now) = booked("PS-1");
        storage.execute(Insert(session.clone())).await.unwrap();

        let mut fresh = session.clone();
        assert!(fresh.activate(now).unwrap());
        let stored = storage.execute(Update(fresh)).await.unwrap();
        assert_eq!(stored.revision, session.revision.bumped());

        // A write based on the pre-update snapshot must lose.
        let mut stale = session;
        assert!(stale.terminate(now, session::EndedBy::Client));
        let err = storage.execute(Update(stale)).await.unwrap_err();
        assert!(matches!(err.as_ref(), Error::StaleWrite(_)));
    }

    #[tokio::test]
    async fn update_keeps_extension_references_unique_across_sessions() {
        let storage = Memory::default();
        let (a, now) = booked("PS-A");
        let (b, _) = booked("PS-B");
        storage.execute(Insert(a.clone())).await.unwrap();
        storage.execute(Insert(b.clone())).await.unwrap();

        let extend = |session: &Session| {
            let mut s = session.clone();
            assert!(s.activate(now).unwrap());
            s.extend(
                now,
                Hours::ONE,
                payment::Reference::new("PS-EXT").unwrap(),
                ngn(500),
            )
            .unwrap();
            s
        };

        storage.execute(Update(extend(&a))).await.unwrap();

        let err = storage.execute(Update(extend(&b))).await.unwrap_err();
        assert!(matches!(err.as_ref(), Error::DuplicateReference(_)));
    }

    #[tokio::test]
    async fn timed_out_selector_matches_overdue_active_only() {
        let storage = Memory::default();
        let (mut overdue, now) = booked("PS-1");
        assert!(overdue.activate(now).unwrap());
        let (mut running, _) = booked("PS-2");
        assert!(running.activate(now + Duration::from_secs(3_000)).unwrap());
        let (pending, _) = booked("PS-3");

        for s in [overdue.clone(), running, pending] {
            storage.execute(Insert(s)).await.unwrap();
        }

        let late = now + Duration::from_secs(3_601);
        let timed_out: Vec<Session> = storage
            .execute(Select(By::new(read::session::TimedOut(late))))
            .await
            .unwrap();

        assert_eq!(timed_out.len(), 1);
        assert_eq!(timed_out[0].id, overdue.id);
    }

    #[tokio::test]
    async fn stale_booking_selector_matches_lapsed_pending_only() {
        let storage = Memory::default();
        let (stale, now) = booked("PS-1");
        let (mut active, _) = booked("PS-2");
        assert!(active.activate(now).unwrap());

        for s in [stale.clone(), active] {
            storage.execute(Insert(s)).await.unwrap();
        }

        let late = now + Duration::from_secs(24 * 3_600 + 1);
        let lapsed: Vec<Session> = storage
            .execute(Select(By::new(read::session::StaleBooking(late))))
            .await
            .unwrap();

        assert_eq!(lapsed.len(), 1);
        assert_eq!(lapsed[0].id, stale.id);
    }

    #[tokio::test]
    async fn messages_append_in_order_and_read_receipt_spares_own() {
        let storage = Memory::default();
        let (session, _) = booked("PS-1");
        storage.execute(Insert(session.clone())).await.unwrap();

        for (sender, text) in [
            (Role::Client, "first"),
            (Role::Professional, "second"),
            (Role::Client, "third"),
        ] {
            storage
                .execute(Insert(chat(&session, sender, text)))
                .await
                .unwrap();
        }

        storage
            .execute(Perform(message::MarkRead {
                session_id: session.id,
                reader: Role::Professional,
            }))
            .await
            .unwrap();

        let messages: Vec<Message> = storage
            .execute(Select(By::<Vec<Message>, _>::new(session.id)))
            .await
            .unwrap();
        let texts: Vec<&str> =
            messages.iter().map(|m| m.content.as_ref()).collect();

        assert_eq!(texts, ["first", "second", "third"]);
        assert!(messages[0].read_by_recipient);
        assert!(!messages[1].read_by_recipient);
        assert!(messages[2].read_by_recipient);
    }

    #[tokio::test]
    async fn review_is_unique_per_session() {
        let storage = Memory::default();
        let (session, now) = booked("PS-1");
        storage.execute(Insert(session.clone())).await.unwrap();

        let submitted = Review {
            session_id: session.id,
            rating: review::Rating::new(5).unwrap(),
            comment: None,
            created_at: now.coerce(),
        };
        storage.execute(Insert(submitted.clone())).await.unwrap();

        let mut repeated = submitted;
        repeated.rating = review::Rating::new(1).unwrap();
        let err = storage.execute(Insert(repeated)).await.unwrap_err();
        assert!(matches!(err.as_ref(), Error::DuplicateReview(_)));

        let stored: Option<Review> = storage
            .execute(Select(By::<Option<Review>, _>::new(session.id)))
            .await
            .unwrap();
        assert_eq!(
            stored.map(|r| r.rating),
            Some(review::Rating::new(5).unwrap()),
        );
    }
}
