//! [`Storage`]-related implementations.

pub mod memory;

use derive_more::{Display, Error as StdError};

#[cfg(doc)]
use crate::domain::{Review, Session};
use crate::domain::{payment, session};

pub use self::memory::Memory;

/// Storage operation.
pub use common::Handler as Storage;

/// [`Storage`] error.
#[derive(Clone, Debug, Display, StdError)]
pub enum Error {
    /// [`payment::Reference`] has paid for a [`Session`] or an extension
    /// already.
    #[display("payment reference `{_0}` is used already")]
    DuplicateReference(#[error(not(source))] payment::Reference),

    /// [`Session`] with the same ID is stored already.
    #[display("`Session(id: {_0})` is stored already")]
    DuplicateSession(#[error(not(source))] session::Id),

    /// [`Review`] for the [`Session`] is stored already.
    #[display("`Review` for `Session(id: {_0})` is stored already")]
    DuplicateReview(#[error(not(source))] session::Id),

    /// [`Session`] with the provided ID is not stored.
    #[display("`Session(id: {_0})` is not stored")]
    SessionNotFound(#[error(not(source))] session::Id),

    /// Stored [`Session`] revision doesn't match the updated one.
    ///
    /// Another writer has committed in between the caller's read and write.
    #[display("`Session(id: {_0})` was updated concurrently")]
    StaleWrite(#[error(not(source))] session::Id),
}
