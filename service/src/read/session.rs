//! Read selectors over stored [`Session`]s.

use common::DateTime;

#[cfg(doc)]
use crate::domain::{session::Status, Session};

/// Selector of [`Status::Active`] [`Session`]s whose clock ran out before
/// the carried instant.
///
/// The instant is carried explicitly, so the storage never consults a clock
/// of its own and sweeps stay reproducible under test.
#[derive(Clone, Copy, Debug)]
pub struct TimedOut(pub DateTime);

/// Selector of [`Status::Pending`] [`Session`]s whose booking deadline
/// passed before the carried instant without either party engaging.
#[derive(Clone, Copy, Debug)]
pub struct StaleBooking(pub DateTime);
