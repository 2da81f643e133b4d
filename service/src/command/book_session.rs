//! [`Command`] for booking a paid [`Session`].

use common::{
    operations::{By, Insert, Select},
    DateTime, Hours, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        client,
        identity::Role,
        payment, professional,
        session::{self, Status},
        Professional, Session,
    },
    event::Event,
    infra::{
        directory,
        payments::{self, Confirmation},
        storage, Directory, Gateway, Storage,
    },
    Service,
};

use super::{mint_client_token, Command};

/// [`Command`] for booking a [`Session`] once its initial charge is paid.
///
/// The charge is verified with the payment [`Gateway`] directly before any
/// state is written, so a forged or unsettled [`payment::Reference`] never
/// produces a [`Session`].
#[derive(Clone, Debug)]
pub struct BookSession {
    /// ID of the [`Professional`] to be consulted.
    pub professional_id: professional::Id,

    /// Whole [`Hours`] of consultation purchased.
    pub hours: Hours,

    /// [`payment::Reference`] of the charge paying for this booking.
    pub reference: payment::Reference,
}

/// Output of [`BookSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Booked [`Session`], in [`Status::Pending`] until first engaged.
    pub session: Session,

    /// [`client::Token`] being the only credential of the client side.
    pub token: client::Token,
}

impl<St, Gw, Dir> Command<BookSession> for Service<St, Gw, Dir>
where
    St: Storage<Insert<Session>, Ok = (), Err = Traced<storage::Error>>,
    Gw: Gateway<
        Select<By<Confirmation, payment::Reference>>,
        Ok = Confirmation,
        Err = Traced<payments::Error>,
    >,
    Dir: Directory<
        Select<By<Option<Professional>, professional::Id>>,
        Ok = Option<Professional>,
        Err = Traced<directory::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: BookSession) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let BookSession {
            professional_id,
            hours,
            reference,
        } = cmd;

        let professional = self
            .directory()
            .execute(Select(By::<Option<Professional>, _>::new(
                professional_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ProfessionalNotExists(professional_id))
            .map_err(tracerr::wrap!())?;
        if !professional.is_verified {
            return Err(tracerr::new!(E::ProfessionalUnavailable(
                professional_id,
            )));
        }
        let due = professional.price_per_hour * hours;

        let confirmation = self
            .gateway()
            .execute(Select(By::<Confirmation, _>::new(reference.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !confirmation.amount.covers(&due) {
            return Err(tracerr::new!(E::Underpaid {
                paid: confirmation.amount,
                due,
            }));
        }

        let now = DateTime::now();
        let session = Session {
            id: session::Id::new(),
            professional_id,
            client_handle: client::Handle::generate(),
            price_per_hour: professional.price_per_hour,
            hours,
            total_paid: confirmation.amount,
            payment_reference: reference,
            extensions: Vec::new(),
            created_at: now.coerce(),
            booking_expires_at: (now + self.config.booking_timeout).coerce(),
            started_at: None,
            expires_at: None,
            last_message_at: None,
            ended_at: None,
            ended_by: None,
            unread_for_professional: false,
            status: Status::Pending,
            revision: session::Revision::default(),
        };
        self.storage()
            .execute(Insert(session.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let token = mint_client_token(
            &self.config.jwt_encoding_key,
            &client::Claims {
                session_id: session.id,
                role: Role::Client,
                handle: session.client_handle.clone(),
                issued_at: now.coerce(),
                expires_at: (now
                    + self.config.booking_timeout
                    + hours.duration()
                    + client::Claims::VALIDITY_MARGIN)
                    .coerce(),
            },
        )
        .map_err(tracerr::from_and_wrap!(=> E))?;

        self.publish(Event::Booked {
            session_id: session.id,
        });

        Ok(Output { session, token })
    }
}

/// Error of [`BookSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Directory`] error.
    #[display("`Directory` lookup failed: {_0}")]
    #[from]
    Directory(directory::Error),

    /// [`payment::Reference`] already paid for a [`Session`].
    ///
    /// This is the idempotency boundary for at-least-once gateway callbacks:
    /// replaying a confirmation never books a second [`Session`].
    #[display("payment reference `{_0}` was applied before")]
    DuplicateReference(#[error(not(source))] payment::Reference),

    /// [`jsonwebtoken`] encoding error.
    #[display("Failed to encode a JSON Web Token: {_0}")]
    #[from]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// Payment [`Gateway`] error.
    #[display("payment `Gateway` failed: {_0}")]
    #[from]
    Payments(payments::Error),

    /// [`Professional`] with the provided ID is not listed.
    #[display("`Professional(id: {_0})` is not listed")]
    ProfessionalNotExists(#[error(not(source))] professional::Id),

    /// [`Professional`] is listed, but not open for booking.
    #[display("`Professional(id: {_0})` is not available for booking")]
    ProfessionalUnavailable(#[error(not(source))] professional::Id),

    /// [`Storage`] error.
    #[display("`Storage` operation failed: {_0}")]
    Storage(storage::Error),

    /// Settled amount does not cover the price of the booking.
    #[display("charge settled at {paid}, but {due} is due")]
    Underpaid {
        /// Amount the [`Gateway`] reports as paid.
        paid: Money,

        /// Amount due for the booking.
        due: Money,
    },
}

impl From<storage::Error> for ExecutionError {
    fn from(e: storage::Error) -> Self {
        match e {
            storage::Error::DuplicateReference(r) => {
                Self::DuplicateReference(r)
            }
            e @ (storage::Error::DuplicateSession(_)
            | storage::Error::DuplicateReview(_)
            | storage::Error::SessionNotFound(_)
            | storage::Error::StaleWrite(_)) => Self::Storage(e),
        }
    }
}

#[cfg(test)]
mod spec {
    use common::Hours;
    use jsonwebtoken::Validation;

    use crate::{
        command::Command as _,
        domain::{client, payment, session::Status},
        event::Event,
        harness,
    };

    use super::{BookSession, ExecutionError};

    fn paid_booking(
        service: &harness::TestService,
        reference: &str,
        hours: u16,
        amount: u64,
    ) -> BookSession {
        let reference = payment::Reference::new(reference).unwrap();
        service
            .gateway()
            .settle(reference.clone(), harness::ngn(amount));
        BookSession {
            professional_id: harness::professional().id,
            hours: Hours::new(hours).unwrap(),
            reference,
        }
    }

    #[tokio::test]
    async fn books_a_pending_session_once_the_charge_is_settled() {
        let service = harness::service();
        let mut events = service.subscribe();

        let out = service
            .execute(paid_booking(&service, "PS-BOOK-OK", 2, 1_000))
            .await
            .unwrap();

        assert_eq!(out.session.status, Status::Pending);
        assert_eq!(out.session.total_paid, harness::ngn(1_000));
        assert!(out.session.started_at.is_none());
        assert!(out.session.expires_at.is_none());
        assert!(matches!(
            events.try_recv(),
            Ok(Event::Booked { session_id }) if session_id == out.session.id,
        ));

        let claims = jsonwebtoken::decode::<client::Claims>(
            out.token.as_ref(),
            &service.config().jwt_decoding_key,
            &Validation::default(),
        )
        .unwrap()
        .claims;
        assert_eq!(claims.session_id, out.session.id);
        assert_eq!(claims.handle, out.session.client_handle);
    }

    #[tokio::test]
    async fn refuses_unsettled_charge() {
        let service = harness::service();

        let err = service
            .execute(BookSession {
                professional_id: harness::professional().id,
                hours: Hours::ONE,
                reference: payment::Reference::new("PS-UNPAID").unwrap(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Payments(_)));
    }

    #[tokio::test]
    async fn refuses_underpaid_charge() {
        let service = harness::service();

        let err = service
            .execute(paid_booking(&service, "PS-CHEAP", 2, 700))
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Underpaid { .. }));
    }

    #[tokio::test]
    async fn replayed_reference_books_no_second_session() {
        let service = harness::service();

        let cmd = paid_booking(&service, "PS-REPLAY", 1, 500);
        _ = service.execute(cmd.clone()).await.unwrap();
        let err = service.execute(cmd).await.unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::DuplicateReference(_),
        ));
    }
}
