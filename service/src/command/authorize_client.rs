//! [`Command`] for authorizing an anonymous client.

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use jsonwebtoken::Validation;
use tracerr::Traced;

use crate::{
    domain::{client, identity::Role, session, Session},
    infra::{storage, Storage},
    Service,
};

use super::Command;

/// [`Command`] for authorizing an anonymous client by their bearer
/// [`client::Token`].
///
/// The [`client::Token`] is the only credential a client ever holds, so this
/// is the sole entry point into the client side of a [`Session`].
#[derive(Clone, Debug, From)]
pub struct AuthorizeClient {
    /// [`client::Token`] to authorize.
    pub token: client::Token,
}

impl<St, Gw, Dir> Command<AuthorizeClient> for Service<St, Gw, Dir>
where
    St: Storage<
        Select<By<Option<Session>, session::Id>>,
        Ok = Option<Session>,
        Err = Traced<storage::Error>,
    >,
{
    type Ok = client::Binding;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeClient,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeClient { token } = cmd;

        let claims = jsonwebtoken::decode::<client::Claims>(
            token.as_ref(),
            &self.config.jwt_decoding_key,
            &Validation::default(),
        )
        .map_err(tracerr::from_and_wrap!(=> E))?
        .claims;

        let session = self
            .storage()
            .execute(Select(By::<Option<Session>, _>::new(claims.session_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SessionNotExists(claims.session_id))
            .map_err(tracerr::wrap!())?;

        if claims.role != Role::Client
            || claims.handle != session.client_handle
        {
            return Err(tracerr::new!(E::BindingMismatch(claims.session_id)));
        }

        Ok(client::Binding {
            session_id: session.id,
            handle: claims.handle,
        })
    }
}

/// Error of [`AuthorizeClient`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`client::Token`] doesn't match the [`Session`] it claims.
    #[display("token is not bound to `Session(id: {_0})`")]
    #[from(ignore)]
    BindingMismatch(#[error(not(source))] session::Id),

    /// [`jsonwebtoken`] decoding error.
    #[display("Failed to decode a JSON Web Token: {_0}")]
    JsonWebTokenDecodeError(jsonwebtoken::errors::Error),

    /// [`Session`] the [`client::Token`] is scoped to does not exist.
    #[display("`Session(id: {_0})` does not exist")]
    #[from(ignore)]
    SessionNotExists(#[error(not(source))] session::Id),

    /// [`Storage`] error.
    #[display("`Storage` operation failed: {_0}")]
    Storage(storage::Error),
}
