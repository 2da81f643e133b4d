//! Request authentication definitions.

use axum::{async_trait, extract::FromRequestParts, RequestPartsExt as _};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use service::{
    command::{self, Command as _},
    domain::{client, identity::Staff, Identity},
};

#[cfg(doc)]
use service::domain::{Professional, Session};
use crate::{define_error, AsError, Error, Service};

/// Header carrying the [`Professional`] ID authenticated by the upstream
/// account system.
const STAFF_HEADER: &str = "X-Professional-Id";

/// Proven [`Identity`] of the calling party.
///
/// The two sides of a [`Session`] authenticate differently: the anonymous
/// client presents the bearer token minted at booking, while the
/// [`Professional`] is authenticated upstream and arrives with their ID in
/// the [`STAFF_HEADER`].
#[derive(Clone, Debug)]
pub struct Auth(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service = parts
            .extensions
            .get::<Service>()
            .cloned()
            .ok_or_else(|| Error::internal(&"missing `Service` extension"))?;

        if let Some(header) = parts.headers.get(STAFF_HEADER) {
            let professional_id = header
                .to_str()
                .ok()
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| Error::from(AuthError::InvalidStaffId))?;
            return Ok(Self(Identity::Staff(Staff { professional_id })));
        }

        match parts.extract::<TypedHeader<Authorization<Bearer>>>().await {
            Ok(TypedHeader(Authorization(bearer))) => {
                #[expect(unsafe_code, reason = "specified in correct header")]
                let token = unsafe {
                    client::Token::new_unchecked(bearer.token().to_owned())
                };
                service
                    .execute(command::AuthorizeClient { token })
                    .await
                    .map(|binding| Self(Identity::Client(binding)))
                    .map_err(AsError::into_error)
            }
            Err(e) => {
                if e.is_missing() {
                    Err(AuthError::AuthorizationRequired.into())
                } else {
                    Err(e.into_error())
                }
            }
        }
    }
}

impl AsError for command::authorize_client::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "INVALID_OR_EXPIRED_TOKEN"]
                #[status = UNAUTHORIZED]
                #[message = "Provided client token is invalid or expired"]
                InvalidToken,
            }
        }

        match self {
            Self::BindingMismatch(_)
            | Self::JsonWebTokenDecodeError(_)
            | Self::SessionNotExists(_) => Some(Error::InvalidToken.into()),
            Self::Storage(e) => e.try_as_error(),
        }
    }
}

define_error! {
    enum AuthError {
        #[code = "AUTHORIZATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authorization required"]
        AuthorizationRequired,

        #[code = "INVALID_STAFF_ID"]
        #[status = BAD_REQUEST]
        #[message = "Provided staff header is not a `Professional` ID"]
        InvalidStaffId,
    }
}
