//! HTTP API definitions.

pub mod booking;
pub mod message;
pub mod review;
pub mod room;
pub mod session;

use axum::{
    routing::{get, post},
    Router,
};

use crate::define_error;

/// Builds the [`Router`] serving the whole API.
///
/// The [`Service`] is expected to be provided as an [`Extension`] layer.
///
/// [`Extension`]: axum::Extension
/// [`Service`]: crate::Service
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/bookings", post(booking::initiate))
        .route("/sessions", post(booking::confirm))
        .route("/sessions/:id", get(session::status))
        .route("/sessions/:id/activate", post(session::activate))
        .route("/sessions/:id/end", post(session::end))
        .route("/sessions/:id/extensions", post(session::initiate_extension))
        .route("/sessions/:id/extensions/confirm", post(session::extend))
        .route("/sessions/:id/messages", get(message::history))
        .route("/sessions/:id/reviews", post(review::submit))
        .route("/rooms/:id", get(room::join))
}

define_error! {
    enum SessionError {
        #[code = "NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "`Session` with the provided ID does not exist"]
        NotExists,
    }
}

define_error! {
    enum PrivilegeError {
        #[code = "UNAUTHORIZED"]
        #[status = FORBIDDEN]
        #[message = "Caller is not a party of the `Session`"]
        NotParty,

        #[code = "UNAUTHORIZED"]
        #[status = FORBIDDEN]
        #[message = "Only the client side may perform this action"]
        NotClient,
    }
}

define_error! {
    enum TransitionError {
        #[code = "INVALID_TRANSITION"]
        #[status = CONFLICT]
        #[message = "`Session` status does not allow this transition"]
        Invalid,
    }
}

define_error! {
    enum DurationError {
        #[code = "INVALID_DURATION"]
        #[status = BAD_REQUEST]
        #[message = "Requested hours must be between 1 and 24"]
        Invalid,
    }
}
