//! [`Review`]-related API definitions.

use axum::{extract::Path, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use service::{
    command::{self, Command as _},
    domain::{self, review, session},
};

use crate::{api, define_error, AsError, Auth, Error, Service};

/// Request to leave a [`Review`] on an ended `Session`.
///
/// [`Review`]: domain::Review
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Star rating, from 1 to 5.
    pub rating: u8,

    /// Optional free-form comment.
    pub comment: Option<String>,
}

/// Representation of a [`domain::Review`] exposed to its author.
#[derive(Debug, Serialize)]
pub struct Review {
    /// ID of the reviewed `Session`.
    pub session_id: session::Id,

    /// Star rating, from 1 to 5.
    pub rating: review::Rating,

    /// Optional free-form comment.
    pub comment: Option<review::Comment>,

    /// [RFC 3339] timestamp of the submission.
    ///
    /// [RFC 3339]: https://datatracker.ietf.org/doc/html/rfc3339
    pub created_at: String,
}

impl From<domain::Review> for Review {
    fn from(review: domain::Review) -> Self {
        let domain::Review {
            session_id,
            rating,
            comment,
            created_at,
        } = review;

        Self {
            session_id,
            rating,
            comment,
            created_at: created_at.to_rfc3339(),
        }
    }
}

/// Submits a [`Review`] for the identified ended `Session`.
///
/// Only the paying client may review, each `Session` at most once.
///
/// # Errors
///
/// Possible error codes:
/// - `INVALID_RATING` - rating is out of the 1..=5 range;
/// - `INVALID_COMMENT` - comment is blank or oversized;
/// - `NOT_FOUND` - no `Session` with the provided ID exists;
/// - `UNAUTHORIZED` - caller is not the paying client;
/// - `INVALID_TRANSITION` - the `Session` hasn't ended yet;
/// - `REVIEW_ALREADY_SUBMITTED` - the `Session` is reviewed already.
pub async fn submit(
    Extension(service): Extension<Service>,
    Path(session_id): Path<session::Id>,
    Auth(identity): Auth,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Review>), Error> {
    let SubmitRequest { rating, comment } = req;
    let rating = review::Rating::new(rating)
        .ok_or_else(|| Error::from(RequestError::InvalidRating))?;
    let comment = comment
        .map(|c| {
            review::Comment::new(c)
                .ok_or_else(|| Error::from(RequestError::InvalidComment))
        })
        .transpose()?;

    service
        .execute(command::SubmitReview {
            session_id,
            identity,
            rating,
            comment,
        })
        .await
        .map(|review| (StatusCode::CREATED, Json(review.into())))
        .map_err(AsError::into_error)
}

define_error! {
    enum RequestError {
        #[code = "INVALID_RATING"]
        #[status = BAD_REQUEST]
        #[message = "Rating must be between 1 and 5 stars"]
        InvalidRating,

        #[code = "INVALID_COMMENT"]
        #[status = BAD_REQUEST]
        #[message = "Comment must be non-blank and at most 2048 bytes long"]
        InvalidComment,
    }
}

impl AsError for command::submit_review::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "REVIEW_ALREADY_SUBMITTED"]
                #[status = CONFLICT]
                #[message = "`Session` is reviewed already"]
                AlreadyReviewed,

                #[code = "INVALID_TRANSITION"]
                #[status = CONFLICT]
                #[message = "`Session` must have ended before it can be \
                             reviewed"]
                NotReviewable,
            }
        }

        Some(match self {
            Self::AlreadyReviewed(_) => Error::AlreadyReviewed.into(),
            Self::NotClient => api::PrivilegeError::NotClient.into(),
            Self::NotParty(_) => api::PrivilegeError::NotParty.into(),
            Self::NotReviewable(_) => Error::NotReviewable.into(),
            Self::SessionNotExists(_) => api::SessionError::NotExists.into(),
            Self::Storage(e) => return e.try_as_error(),
        })
    }
}
