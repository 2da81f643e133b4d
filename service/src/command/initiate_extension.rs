//! [`Command`] for starting a [`Session`] extension checkout.

use common::{
    operations::{By, Select, Start},
    DateTime, Hours,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        identity::Role,
        payment,
        session::{self, Status},
        Identity, Session,
    },
    infra::{
        payments::{self, Charge, Redirect},
        storage, Gateway, Storage,
    },
    Service,
};

#[cfg(doc)]
use super::ExtendSession;
use super::Command;

/// [`Command`] for starting a [`Session`] extension checkout with the
/// payment [`Gateway`].
///
/// Only the bound client may pay for more time, and only while the
/// [`Session`] clock is still running. Nothing is written here: the minted
/// charge extends the [`Session`] via [`ExtendSession`] once paid.
#[derive(Clone, Debug)]
pub struct InitiateExtension {
    /// ID of the [`Session`] to be extended.
    pub session_id: session::Id,

    /// Proven [`Identity`] of the paying client.
    pub identity: Identity,

    /// Additional whole [`Hours`] to purchase.
    pub hours: Hours,

    /// [`payment::Contact`] the [`Gateway`] sends its receipt to.
    pub contact: payment::Contact,
}

impl<St, Gw, Dir> Command<InitiateExtension> for Service<St, Gw, Dir>
where
    St: Storage<
        Select<By<Option<Session>, session::Id>>,
        Ok = Option<Session>,
        Err = Traced<storage::Error>,
    >,
    Gw: Gateway<Start<Charge>, Ok = Redirect, Err = Traced<payments::Error>>,
{
    type Ok = Redirect;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: InitiateExtension,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let InitiateExtension {
            session_id,
            identity,
            hours,
            contact,
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
        match session.status_at(DateTime::now()) {
            Status::Active => {}
            Status::Expired => {
                return Err(tracerr::new!(E::SessionExpired));
            }
            s @ (Status::Pending | Status::Ended | Status::Cancelled) => {
                return Err(tracerr::new!(E::SessionNotActive(s)));
            }
        }

        self.gateway()
            .execute(Start(Charge {
                contact,
                amount: session.price_per_hour * hours,
                reference: payment::Reference::mint(),
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`InitiateExtension`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Identity`] is a party, but not the paying client.
    #[display("only the client side may pay for an extension")]
    NotClient,

    /// [`Identity`] is not a party of the [`Session`].
    #[display("not a party of `Session(id: {_0})`")]
    NotParty(#[error(not(source))] session::Id),

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

    /// [`Storage`] error.
    #[display("`Storage` operation failed: {_0}")]
    #[from]
    Storage(storage::Error),
}
