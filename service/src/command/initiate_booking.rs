//! [`Command`] for starting a [`Session`] booking checkout.

use common::{
    operations::{By, Select, Start},
    Hours,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::Session;
use crate::{
    domain::{payment, professional, Professional},
    infra::{
        directory,
        payments::{self, Charge, Redirect},
        Directory, Gateway,
    },
    Service,
};

#[cfg(doc)]
use super::BookSession;
use super::Command;

/// [`Command`] for starting a [`Session`] booking checkout with the payment
/// [`Gateway`].
///
/// No [`Session`] exists yet at this point: the charge minted here has to be
/// paid first, and [`BookSession`] then turns the confirmed charge into a
/// [`Session`].
#[derive(Clone, Debug)]
pub struct InitiateBooking {
    /// ID of the [`Professional`] to be consulted.
    pub professional_id: professional::Id,

    /// Whole [`Hours`] of consultation to purchase.
    pub hours: Hours,

    /// [`payment::Contact`] the [`Gateway`] sends its receipt to.
    pub contact: payment::Contact,
}

impl<St, Gw, Dir> Command<InitiateBooking> for Service<St, Gw, Dir>
where
    Gw: Gateway<Start<Charge>, Ok = Redirect, Err = Traced<payments::Error>>,
    Dir: Directory<
        Select<By<Option<Professional>, professional::Id>>,
        Ok = Option<Professional>,
        Err = Traced<directory::Error>,
    >,
{
    type Ok = Redirect;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: InitiateBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let InitiateBooking {
            professional_id,
            hours,
            contact,
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

        self.gateway()
            .execute(Start(Charge {
                contact,
                amount: professional.price_per_hour * hours,
                reference: payment::Reference::mint(),
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
    }
}

/// Error of [`InitiateBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Directory`] error.
    #[display("`Directory` lookup failed: {_0}")]
    #[from]
    Directory(directory::Error),

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
}

#[cfg(test)]
mod spec {
    use common::Hours;

    use crate::{command::Command as _, domain::professional, harness};

    use super::{ExecutionError, InitiateBooking};

    #[tokio::test]
    async fn charges_the_listed_rate_times_hours() {
        let service = harness::service();

        let redirect = service
            .execute(InitiateBooking {
                professional_id: harness::professional().id,
                hours: Hours::new(2).unwrap(),
                contact: harness::contact(),
            })
            .await
            .unwrap();

        let charge = service
            .gateway()
            .charged(&redirect.reference)
            .expect("charge reached the gateway");
        assert_eq!(charge.amount, harness::ngn(1_000));
        assert!(!redirect.url.is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_professional() {
        let service = harness::service();

        let err = service
            .execute(InitiateBooking {
                professional_id: professional::Id::new(),
                hours: Hours::ONE,
                contact: harness::contact(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::ProfessionalNotExists(_),
        ));
    }

    #[tokio::test]
    async fn rejects_unverified_professional() {
        let service = harness::service();

        let err = service
            .execute(InitiateBooking {
                professional_id: harness::unverified().id,
                hours: Hours::ONE,
                contact: harness::contact(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::ProfessionalUnavailable(_),
        ));
    }
}
