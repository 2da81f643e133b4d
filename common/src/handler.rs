//! [`Handler`] abstractions.

use std::future::Future;

/// Executable handler.
///
/// This is the single seam every layer of the platform plugs into: service
/// commands and queries, storage operations, payment gateway calls, directory
/// lookups, notifications and background tasks are all [`Handler`]
/// implementations over typed arguments.
pub trait Handler<Args = ()> {
    /// Type of successful [`Handler`] result.
    type Ok;

    /// Type of this [`Handler`] error.
    type Err;

    /// Executes this [`Handler`] with the provided arguments.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
