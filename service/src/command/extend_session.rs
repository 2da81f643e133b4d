//! [`Command`] for applying a paid extension to a [`Session`].

use common::{
    operations::{By, Select, Update},
    DateTime, Hours, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        client,
        identity::Role,
        payment,
        session::{self, ExtensionError, Status},
        Session,
    },
    event::Event,
    infra::{
        payments::{self, Confirmation},
        storage, Gateway, Storage,
    },
    Service,
};

use super::{commit, mint_client_token, Command, CommitError};

/// [`Command`] for crediting paid [`Hours`] to a running [`Session`].
///
/// Completes the checkout started by [`InitiateExtension`]: verifies the
/// charge with the payment [`Gateway`], pushes the [`Session`] deadline
/// forward and re-mints the client's [`Token`][1] so it outlives the new
/// deadline.
///
/// No [`Identity`] is demanded here: the [`payment::Reference`] is
/// single-use and only ever disclosed to whoever completed the checkout.
///
/// [`InitiateExtension`]: super::InitiateExtension
/// [1]: client::Token
#[derive(Clone, Debug)]
pub struct ExtendSession {
    /// ID of the [`Session`] being extended.
    pub session_id: session::Id,

    /// Additional whole [`Hours`] that were paid for.
    pub hours: Hours,

    /// [`payment::Reference`] of the settled extension charge.
    pub reference: payment::Reference,
}

/// Result of a successful [`ExtendSession`] [`Command`] execution.
#[derive(Clone, Debug)]
pub struct Output {
    /// Extended [`Session`].
    pub session: Session,

    /// Re-minted client [`Token`][1] covering the new deadline.
    ///
    /// [1]: client::Token
    pub token: client::Token,
}

impl<St, Gw, Dir> Command<ExtendSession> for Service<St, Gw, Dir>
where
    St: Storage<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<storage::Error>,
        > + Storage<Update<Session>, Ok = Session, Err = Traced<storage::Error>>,
    Gw: Gateway<
        Select<By<Confirmation, payment::Reference>>,
        Ok = Confirmation,
        Err = Traced<payments::Error>,
    >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: ExtendSession) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ExtendSession {
            session_id,
            hours,
            reference,
        } = cmd;

        let session = self
            .storage()
            .execute(Select(By::<Option<Session>, _>::new(session_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SessionNotExists(session_id))
            .map_err(tracerr::wrap!())?;

        let due = session.price_per_hour * hours;
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
        let (session, ()) = commit(self.storage(), session_id, |s| {
            s.extend(now, hours, reference.clone(), confirmation.amount)
                .map_err(|e| match e {
                    ExtensionError::NotActive(s) => E::SessionNotActive(s),
                    ExtensionError::Expired => E::SessionExpired,
                    ExtensionError::DuplicateReference => {
                        E::DuplicateReference(reference.clone())
                    }
                    ExtensionError::Currency => E::CurrencyMismatch,
                })
        })
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let exp = match session.expires_at {
            Some(at) => (at + client::Claims::VALIDITY_MARGIN).coerce(),
            None => (now + client::Claims::VALIDITY_MARGIN).coerce(),
        };
        let claims = client::Claims {
            session_id,
            role: Role::Client,
            handle: session.client_handle.clone(),
            issued_at: now.coerce(),
            expires_at: exp,
        };
        let token = mint_client_token(&self.config.jwt_encoding_key, &claims)
            .map_err(tracerr::from_and_wrap!(=> E))?;

        if let Some(expires_at) = session.expires_at {
            self.publish(Event::Extended {
                session_id,
                expires_at,
            });
        }

        Ok(Output { session, token })
    }
}

/// Error of [`ExtendSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Confirmed charge is not in the [`Session`]'s currency.
    #[display("payment currency differs from the `Session` currency")]
    CurrencyMismatch,

    /// Provided [`payment::Reference`] was credited already.
    #[display("`Reference({_0})` was credited already")]
    DuplicateReference(#[error(not(source))] payment::Reference),

    /// [`client::Token`] encoding error.
    #[display("`jsonwebtoken` encoding failed: {_0}")]
    #[from]
    JsonWebTokenEncodeError(jsonwebtoken::errors::Error),

    /// Payment [`Gateway`] error.
    #[display("payment `Gateway` failed: {_0}")]
    #[from]
    Payments(payments::Error),

    /// [`Session`] clock has run out already, extension requires a rebook.
    #[display("`Session` clock has run out already")]
    SessionExpired,

    /// [`Session`] is not running yet or anymore.
    #[display("`Session` is `{_0}`, not `ACTIVE`")]
    SessionNotActive(#[error(not(source))] Status),

    /// [`Session`] with the provided ID does not exist.
    #[display("`Session(id: {_0})` does not exist")]
    SessionNotExists(#[error(not(source))] session::Id),

    /// [`Session`] was updated concurrently while this [`Command`] was
    /// applying its extension.
    #[display("`Session(id: {_0})` was updated concurrently")]
    StaleSession(#[error(not(source))] session::Id),

    /// [`Storage`] error.
    #[display("`Storage` operation failed: {_0}")]
    Storage(storage::Error),

    /// Confirmed amount does not cover the extension price.
    #[display("paid {paid} while {due} is due")]
    Underpaid {
        /// [`Money`] the charge settled for.
        paid: Money,

        /// [`Money`] the requested [`Hours`] cost.
        due: Money,
    },
}

impl From<storage::Error> for ExecutionError {
    fn from(e: storage::Error) -> Self {
        match e {
            storage::Error::DuplicateReference(r) => Self::DuplicateReference(r),
            e @ (storage::Error::DuplicateSession(_)
            | storage::Error::DuplicateReview(_)
            | storage::Error::SessionNotFound(_)
            | storage::Error::StaleWrite(_)) => Self::Storage(e),
        }
    }
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
