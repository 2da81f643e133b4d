//! Booking-related API definitions.

use axum::{http::StatusCode, Extension, Json};
use common::Hours;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{payment, professional},
    infra::payments,
};

use crate::{api, define_error, AsError, Error, Service};

/// Request to start paying for a new `Session`.
#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    /// ID of the professional to consult.
    pub professional_id: professional::Id,

    /// Whole hours to purchase.
    pub hours: u16,

    /// Email the payment gateway sends its receipt to.
    pub contact: String,
}

/// Checkout hosted by the payment gateway.
#[derive(Debug, Serialize)]
pub struct Checkout {
    /// URL of the hosted checkout page to send the payer to.
    pub checkout_url: String,

    /// Reference identifying the initialized charge.
    pub reference: payment::Reference,
}

impl From<payments::Redirect> for Checkout {
    fn from(redirect: payments::Redirect) -> Self {
        let payments::Redirect { url, reference } = redirect;
        Self {
            checkout_url: url,
            reference,
        }
    }
}

/// Initiates a booking charge for the chosen professional.
///
/// The charge is priced as the professional's per-hour rate multiplied by
/// the requested hours, and nothing is persisted until the charge settles.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_DURATION` - requested hours are out of the 1..=24 range;
/// - `INVALID_CONTACT` - provided contact is not a usable email;
/// - `NOT_FOUND` - no professional with the provided ID is listed;
/// - `PROFESSIONAL_UNAVAILABLE` - the professional is not verified yet.
pub async fn initiate(
    Extension(service): Extension<Service>,
    Json(req): Json<InitiateRequest>,
) -> Result<Json<Checkout>, Error> {
    let InitiateRequest {
        professional_id,
        hours,
        contact,
    } = req;
    let hours = Hours::new(hours)
        .ok_or_else(|| Error::from(api::DurationError::Invalid))?;
    let contact = payment::Contact::new(contact)
        .ok_or_else(|| Error::from(RequestError::InvalidContact))?;

    service
        .execute(command::InitiateBooking {
            professional_id,
            hours,
            contact,
        })
        .await
        .map(|redirect| Json(redirect.into()))
        .map_err(AsError::into_error)
}

/// Request to confirm a settled booking charge.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// ID of the professional the charge was initiated for.
    pub professional_id: professional::Id,

    /// Whole hours that were paid for.
    pub hours: u16,

    /// Reference of the settled charge.
    pub reference: String,
}

/// `Session` booked by a confirmed charge.
#[derive(Debug, Serialize)]
pub struct Booked {
    /// Booked `Session`.
    pub session: api::session::Session,

    /// Bearer token the anonymous client authenticates with.
    pub token: String,
}

/// Confirms a settled booking charge, creating the pending `Session`.
///
/// The charge is verified with the payment gateway directly, so a forged
/// reference buys nothing.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_DURATION` - requested hours are out of the 1..=24 range;
/// - `INVALID_REFERENCE` - provided reference is malformed;
/// - `NOT_FOUND` - no professional with the provided ID is listed;
/// - `PROFESSIONAL_UNAVAILABLE` - the professional is not verified yet;
/// - `PAYMENT_UNVERIFIED` - charge is unsettled or doesn't cover the price;
/// - `DUPLICATE_REFERENCE` - reference was credited already.
pub async fn confirm(
    Extension(service): Extension<Service>,
    Json(req): Json<ConfirmRequest>,
) -> Result<(StatusCode, Json<Booked>), Error> {
    let ConfirmRequest {
        professional_id,
        hours,
        reference,
    } = req;
    let hours = Hours::new(hours)
        .ok_or_else(|| Error::from(api::DurationError::Invalid))?;
    let reference = payment::Reference::new(reference)
        .ok_or_else(|| Error::from(RequestError::InvalidReference))?;

    let command::book_session::Output { session, token } = service
        .execute(command::BookSession {
            professional_id,
            hours,
            reference,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((
        StatusCode::CREATED,
        Json(Booked {
            session: session.into(),
            token: token.to_string(),
        }),
    ))
}

define_error! {
    enum RequestError {
        #[code = "INVALID_CONTACT"]
        #[status = BAD_REQUEST]
        #[message = "Provided contact is not a usable email address"]
        InvalidContact,

        #[code = "INVALID_REFERENCE"]
        #[status = BAD_REQUEST]
        #[message = "Provided payment reference is malformed"]
        InvalidReference,
    }
}

impl AsError for command::initiate_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "NOT_FOUND"]
                #[status = NOT_FOUND]
                #[message = "Professional with the provided ID is not \
                             listed"]
                ProfessionalNotExists,

                #[code = "PROFESSIONAL_UNAVAILABLE"]
                #[status = UNPROCESSABLE_ENTITY]
                #[message = "Professional is not available for booking"]
                ProfessionalUnavailable,
            }
        }

        Some(match self {
            Self::Directory(e) => return e.try_as_error(),
            Self::Payments(e) => return e.try_as_error(),
            Self::ProfessionalNotExists(_) => Error::ProfessionalNotExists.into(),
            Self::ProfessionalUnavailable(_) => {
                Error::ProfessionalUnavailable.into()
            }
        })
    }
}

impl AsError for command::book_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "DUPLICATE_REFERENCE"]
                #[status = CONFLICT]
                #[message = "Payment reference was credited already"]
                DuplicateReference,

                #[code = "NOT_FOUND"]
                #[status = NOT_FOUND]
                #[message = "Professional with the provided ID is not \
                             listed"]
                ProfessionalNotExists,

                #[code = "PROFESSIONAL_UNAVAILABLE"]
                #[status = UNPROCESSABLE_ENTITY]
                #[message = "Professional is not available for booking"]
                ProfessionalUnavailable,

                #[code = "PAYMENT_UNVERIFIED"]
                #[status = PAYMENT_REQUIRED]
                #[message = "Settled amount does not cover the price"]
                Underpaid,
            }
        }

        Some(match self {
            Self::Directory(e) => return e.try_as_error(),
            Self::DuplicateReference(_) => Error::DuplicateReference.into(),
            Self::JsonWebTokenEncodeError(_) => return None,
            Self::Payments(e) => return e.try_as_error(),
            Self::ProfessionalNotExists(_) => Error::ProfessionalNotExists.into(),
            Self::ProfessionalUnavailable(_) => {
                Error::ProfessionalUnavailable.into()
            }
            Self::Storage(e) => return e.try_as_error(),
            Self::Underpaid { .. } => Error::Underpaid.into(),
        })
    }
}
