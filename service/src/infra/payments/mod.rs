//! Payment gateway integration.

pub mod paystack;

use common::{unit, DateTimeOf, Money};
use derive_more::{Display, Error as StdError, From};

#[cfg(doc)]
use common::DateTime;

#[cfg(doc)]
use crate::domain::Session;
use crate::domain::payment;

pub use self::paystack::Paystack;

/// Payment gateway operation.
pub use common::Handler as Gateway;

/// Charge to initiate on a payment [`Gateway`].
#[derive(Clone, Debug)]
pub struct Charge {
    /// [`payment::Contact`] the gateway sends its receipt to.
    pub contact: payment::Contact,

    /// Amount to charge.
    pub amount: Money,

    /// [`payment::Reference`] identifying this [`Charge`].
    pub reference: payment::Reference,
}

/// Gateway checkout a client is redirected to for completing a [`Charge`].
#[derive(Clone, Debug)]
pub struct Redirect {
    /// Checkout URL of the gateway.
    pub url: String,

    /// [`payment::Reference`] of the initiated [`Charge`].
    pub reference: payment::Reference,
}

/// Settled state of a [`Charge`], verified with the [`Gateway`] directly.
///
/// Gateway redirects and callbacks are never trusted on their own: a
/// [`Session`] is only created or extended once the [`Gateway`] itself
/// reports the [`Charge`] as paid.
#[derive(Clone, Debug)]
pub struct Confirmation {
    /// Amount the [`Gateway`] reports as actually paid.
    pub amount: Money,

    /// [`DateTime`] when the [`Charge`] was settled.
    pub paid_at: Option<SettlementDateTime>,
}

/// [`Gateway`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    /// Transport failure talking to the [`Gateway`].
    #[display("gateway request failed: {_0}")]
    #[from]
    Http(reqwest::Error),

    /// [`Gateway`] refused the request itself.
    #[display("gateway refused the request: {_0}")]
    Rejected(#[error(not(source))] String),

    /// [`Charge`] is known to the [`Gateway`], but not settled.
    #[display("charge is not settled, gateway reports it as `{_0}`")]
    Unpaid(#[error(not(source))] String),

    /// Amount cannot be represented in the smallest currency unit.
    #[display("amount is not representable in minor units")]
    Amount,

    /// [`Gateway`] reported an unknown currency.
    #[display("cannot parse gateway currency: {_0}")]
    #[from]
    Currency(strum::ParseError),

    /// [`Gateway`] reported an invalid settlement instant.
    #[display("cannot parse gateway settlement time: {_0}")]
    #[from]
    PaidAt(common::datetime::ParseError),
}

/// [`DateTime`] when a [`Charge`] was settled.
pub type SettlementDateTime = DateTimeOf<(Confirmation, unit::Creation)>;
