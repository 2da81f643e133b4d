//! [`Session`]-related API definitions.

use axum::{extract::Path, Extension, Json};
use common::Hours;
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, client, payment, professional, session},
    query,
};

use crate::{api, define_error, AsError, Auth, Error, Service};

/// Representation of a [`domain::Session`] exposed to its parties.
#[derive(Debug, Serialize)]
pub struct Session {
    /// ID of the `Session`.
    pub id: session::Id,

    /// ID of the consulted professional.
    pub professional_id: professional::Id,

    /// Pseudonymous handle of the paying client.
    pub client_handle: client::Handle,

    /// Current status of the `Session`.
    pub status: session::Status,

    /// Whole hours purchased with the initial booking.
    pub hours: u16,

    /// Per-hour rate the `Session` was sold at.
    pub price_per_hour: common::Money,

    /// Total amount paid, extensions included.
    pub total_paid: common::Money,

    /// Reference of the initial booking charge.
    pub payment_reference: payment::Reference,

    /// Number of extensions applied so far.
    pub extensions: usize,

    /// [RFC 3339] timestamp of the booking.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub created_at: String,

    /// [RFC 3339] deadline for first engaging the booking.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub booking_expires_at: String,

    /// [RFC 3339] timestamp of the activation, once activated.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub started_at: Option<String>,

    /// [RFC 3339] instant the clock runs out at, once activated.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub expires_at: Option<String>,

    /// [RFC 3339] timestamp of the closure, once closed.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub ended_at: Option<String>,

    /// Party that closed the `Session`, once closed.
    pub ended_by: Option<session::EndedBy>,

    /// Whether client messages await the professional.
    pub unread_for_professional: bool,
}

impl From<domain::Session> for Session {
    fn from(session: domain::Session) -> Self {
        let domain::Session {
            id,
            professional_id,
            client_handle,
            price_per_hour,
            hours,
            total_paid,
            payment_reference,
            extensions,
            created_at,
            booking_expires_at,
            started_at,
            expires_at,
            last_message_at: _,
            ended_at,
            ended_by,
            unread_for_professional,
            status,
            revision: _,
        } = session;

        Self {
            id,
            professional_id,
            client_handle,
            status,
            hours: hours.get(),
            price_per_hour,
            total_paid,
            payment_reference,
            extensions: extensions.len(),
            created_at: created_at.to_rfc3339(),
            booking_expires_at: booking_expires_at.to_rfc3339(),
            started_at: started_at.map(|at| at.to_rfc3339()),
            expires_at: expires_at.map(|at| at.to_rfc3339()),
            ended_at: ended_at.map(|at| at.to_rfc3339()),
            ended_by,
            unread_for_professional,
        }
    }
}

/// Live view over a single `Session`, computed against the wall clock at
/// query time.
#[derive(Debug, Serialize)]
pub struct Status {
    /// Observed status of the `Session`.
    pub status: session::Status,

    /// Whole minutes remaining on the clock, rounded down.
    pub remaining_minutes: u64,

    /// Whether the `Session` is usable right now.
    pub is_active: bool,

    /// [RFC 3339] instant the clock runs out at, once activated.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub expires_at: Option<String>,

    /// Number of extensions applied so far.
    pub extensions: usize,

    /// Whether client messages await the professional.
    pub unread_for_professional: bool,
}

impl From<query::session::Snapshot> for Status {
    fn from(snapshot: query::session::Snapshot) -> Self {
        let query::session::Snapshot {
            status,
            remaining,
            is_active,
            expires_at,
            extensions,
            unread_for_professional,
        } = snapshot;

        Self {
            status,
            remaining_minutes: remaining.as_secs() / 60,
            is_active,
            expires_at: expires_at.map(|at| at.to_rfc3339()),
            extensions,
            unread_for_professional,
        }
    }
}

/// Returns the live [`Status`] of the identified `Session`, as seen by one
/// of its parties.
///
/// An overdue `Session` reads as expired with zero minutes remaining even
/// before the background sweep commits the transition.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_FOUND` - no `Session` with the provided ID exists;
/// - `UNAUTHORIZED` - caller is not a party of the `Session`.
pub async fn status(
    Extension(service): Extension<Service>,
    Path(session_id): Path<session::Id>,
    Auth(identity): Auth,
) -> Result<Json<Status>, Error> {
    service
        .execute(query::session::Status {
            session_id,
            identity,
        })
        .await
        .map(|snapshot| Json(snapshot.into()))
        .map_err(AsError::into_error)
}

/// Activates the identified pending `Session`, starting its paid clock.
///
/// Activating an already active `Session` is a no-op returning its current
/// state, so racing parties cannot restart the clock.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_FOUND` - no `Session` with the provided ID exists;
/// - `UNAUTHORIZED` - caller is not a party of the `Session`;
/// - `INVALID_TRANSITION` - the `Session` is closed already.
pub async fn activate(
    Extension(service): Extension<Service>,
    Path(session_id): Path<session::Id>,
    Auth(identity): Auth,
) -> Result<Json<Session>, Error> {
    service
        .execute(command::ActivateSession {
            session_id,
            identity,
        })
        .await
        .map(|session| Json(session.into()))
        .map_err(AsError::into_error)
}

/// Deliberately ends the identified `Session`.
///
/// Either party may end the `Session` at any point before it's closed;
/// ending an already closed one is a no-op returning its final state.
///
/// # Errors
///
/// Possible error codes:
/// - `NOT_FOUND` - no `Session` with the provided ID exists;
/// - `UNAUTHORIZED` - caller is not a party of the `Session`.
pub async fn end(
    Extension(service): Extension<Service>,
    Path(session_id): Path<session::Id>,
    Auth(identity): Auth,
) -> Result<Json<Session>, Error> {
    service
        .execute(command::TerminateSession {
            session_id,
            identity,
        })
        .await
        .map(|session| Json(session.into()))
        .map_err(AsError::into_error)
}

/// Request to purchase additional hours for a running `Session`.
#[derive(Debug, Deserialize)]
pub struct ExtensionRequest {
    /// Additional whole hours to purchase.
    pub hours: u16,

    /// Email the payment gateway sends its receipt to.
    pub contact: String,
}

/// Initiates an extension charge for the identified `Session`.
///
/// Only the paying client may extend, and only while the `Session` is
/// active with time left on its clock.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_DURATION` - requested hours are out of the 1..=24 range;
/// - `INVALID_CONTACT` - provided contact is not a usable email;
/// - `NOT_FOUND` - no `Session` with the provided ID exists;
/// - `UNAUTHORIZED` - caller is not the paying client;
/// - `SESSION_NOT_ACTIVE` - the `Session` hasn't started or was ended;
/// - `SESSION_ALREADY_EXPIRED` - the clock ran out, a new booking is needed.
pub async fn initiate_extension(
    Extension(service): Extension<Service>,
    Path(session_id): Path<session::Id>,
    Auth(identity): Auth,
    Json(req): Json<ExtensionRequest>,
) -> Result<Json<api::booking::Checkout>, Error> {
    let ExtensionRequest { hours, contact } = req;
    let hours = Hours::new(hours)
        .ok_or_else(|| Error::from(api::DurationError::Invalid))?;
    let contact = payment::Contact::new(contact).ok_or_else(|| {
        Error::from(api::booking::RequestError::InvalidContact)
    })?;

    service
        .execute(command::InitiateExtension {
            session_id,
            identity,
            hours,
            contact,
        })
        .await
        .map(|redirect| Json(redirect.into()))
        .map_err(AsError::into_error)
}

/// Request to confirm a settled extension charge.
#[derive(Debug, Deserialize)]
pub struct ExtendRequest {
    /// Additional whole hours that were paid for.
    pub hours: u16,

    /// Reference of the settled extension charge.
    pub reference: String,
}

/// `Session` extended by a confirmed charge.
#[derive(Debug, Serialize)]
pub struct Extended {
    /// Extended `Session`.
    pub session: Session,

    /// Re-minted client token covering the pushed-back expiry.
    pub token: String,
}

/// Confirms a settled extension charge, pushing the `Session` expiry
/// forward.
///
/// The charge is verified with the payment gateway directly, and the
/// settled reference itself proves the payer, so no credentials are
/// required here.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_DURATION` - requested hours are out of the 1..=24 range;
/// - `INVALID_REFERENCE` - provided reference is malformed;
/// - `NOT_FOUND` - no `Session` with the provided ID exists;
/// - `PAYMENT_UNVERIFIED` - charge is unsettled or doesn't cover the price;
/// - `DUPLICATE_REFERENCE` - reference was credited already;
/// - `SESSION_NOT_ACTIVE` - the `Session` hasn't started or was ended;
/// - `SESSION_ALREADY_EXPIRED` - the clock ran out, a new booking is needed.
pub async fn extend(
    Extension(service): Extension<Service>,
    Path(session_id): Path<session::Id>,
    Json(req): Json<ExtendRequest>,
) -> Result<Json<Extended>, Error> {
    let ExtendRequest { hours, reference } = req;
    let hours = Hours::new(hours)
        .ok_or_else(|| Error::from(api::DurationError::Invalid))?;
    let reference = payment::Reference::new(reference).ok_or_else(|| {
        Error::from(api::booking::RequestError::InvalidReference)
    })?;

    let command::extend_session::Output { session, token } = service
        .execute(command::ExtendSession {
            session_id,
            hours,
            reference,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Extended {
        session: session.into(),
        token: token.to_string(),
    }))
}

impl AsError for query::session::StatusError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Storage(e) => e.try_as_error(),
            Self::SessionNotExists(_) => {
                Some(api::SessionError::NotExists.into())
            }
            Self::NotParty(_) => Some(api::PrivilegeError::NotParty.into()),
        }
    }
}

impl AsError for command::activate_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::InvalidTransition(_) | Self::StaleSession(_) => {
                Some(api::TransitionError::Invalid.into())
            }
            Self::NotParty(_) => Some(api::PrivilegeError::NotParty.into()),
            Self::SessionNotExists(_) => {
                Some(api::SessionError::NotExists.into())
            }
            Self::Storage(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::terminate_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::NotParty(_) => Some(api::PrivilegeError::NotParty.into()),
            Self::SessionNotExists(_) => {
                Some(api::SessionError::NotExists.into())
            }
            Self::StaleSession(_) => Some(api::TransitionError::Invalid.into()),
            Self::Storage(e) => e.try_as_error(),
        }
    }
}

impl AsError for command::initiate_extension::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "SESSION_ALREADY_EXPIRED"]
                #[status = GONE]
                #[message = "`Session` clock has run out; book a new \
                             `Session` instead"]
                Expired,

                #[code = "SESSION_NOT_ACTIVE"]
                #[status = CONFLICT]
                #[message = "`Session` must be active to be extended"]
                NotActive,
            }
        }

        Some(match self {
            Self::NotClient => api::PrivilegeError::NotClient.into(),
            Self::NotParty(_) => api::PrivilegeError::NotParty.into(),
            Self::Payments(e) => return e.try_as_error(),
            Self::SessionExpired => Error::Expired.into(),
            Self::SessionNotActive(_) => Error::NotActive.into(),
            Self::SessionNotExists(_) => api::SessionError::NotExists.into(),
            Self::Storage(e) => return e.try_as_error(),
        })
    }
}

impl AsError for command::extend_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "DUPLICATE_REFERENCE"]
                #[status = CONFLICT]
                #[message = "Payment reference was credited already"]
                DuplicateReference,

                #[code = "PAYMENT_UNVERIFIED"]
                #[status = PAYMENT_REQUIRED]
                #[message = "Settled amount does not cover the extension \
                             price"]
                Underpaid,

                #[code = "SESSION_ALREADY_EXPIRED"]
                #[status = GONE]
                #[message = "`Session` clock has run out; book a new \
                             `Session` instead"]
                Expired,

                #[code = "SESSION_NOT_ACTIVE"]
                #[status = CONFLICT]
                #[message = "`Session` must be active to be extended"]
                NotActive,
            }
        }

        Some(match self {
            Self::CurrencyMismatch | Self::Underpaid { .. } => {
                Error::Underpaid.into()
            }
            Self::DuplicateReference(_) => Error::DuplicateReference.into(),
            Self::JsonWebTokenEncodeError(_) => return None,
            Self::Payments(e) => return e.try_as_error(),
            Self::SessionExpired => Error::Expired.into(),
            Self::SessionNotActive(_) => Error::NotActive.into(),
            Self::SessionNotExists(_) => api::SessionError::NotExists.into(),
            Self::StaleSession(_) => api::TransitionError::Invalid.into(),
            Self::Storage(e) => return e.try_as_error(),
        })
    }
}
