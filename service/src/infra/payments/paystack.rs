//! [Paystack] payment [`Gateway`] implementation.
//!
//! [Paystack]: https://paystack.com

use std::{str::FromStr as _, time::Duration};

use common::{
    money::Currency,
    operations::{By, Select, Start},
    Money,
};
use derive_more::{Display, Error as StdError, From};
use rust_decimal::{prelude::ToPrimitive as _, Decimal};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use tracerr::Traced;

use crate::domain::payment;

use super::{Charge, Confirmation, Error, Gateway, Redirect};

/// [`Paystack`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the [Paystack] API.
    ///
    /// [Paystack]: https://paystack.com
    pub base_url: String,

    /// Secret API key.
    pub secret_key: SecretString,

    /// Timeout of a single API request.
    pub timeout: Duration,
}

/// [Paystack] payment [`Gateway`].
///
/// [Paystack]: https://paystack.com
#[derive(Clone, Debug)]
pub struct Paystack {
    /// HTTP client to perform requests with.
    client: reqwest::Client,

    /// Base URL of the API.
    base_url: String,

    /// Secret API key.
    secret_key: SecretString,
}

impl Paystack {
    /// Creates a new [`Paystack`] gateway out of the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If the underlying HTTP client cannot be initialized.
    pub fn new(config: &Config) -> Result<Self, InitError> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(InitError)?,
            base_url: config.base_url.trim_end_matches('/').into(),
            secret_key: config.secret_key.clone(),
        })
    }
}

impl Gateway<Start<Charge>> for Paystack {
    type Ok = Redirect;
    type Err = Traced<Error>;

    /// Initiates the provided [`Charge`], returning the checkout
    /// [`Redirect`] the client completes the payment at.
    async fn execute(
        &self,
        Start(charge): Start<Charge>,
    ) -> Result<Self::Ok, Self::Err> {
        let request = InitializeRequest {
            email: charge.contact.to_string(),
            amount: minor_units(&charge.amount)
                .ok_or(Error::Amount)
                .map_err(tracerr::wrap!())?,
            currency: charge.amount.currency.to_string(),
            reference: charge.reference.to_string(),
        };

        let response: Envelope<Initialized> = self
            .client
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(self.secret_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?
            .json()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        let data = response.accepted().map_err(tracerr::wrap!())?;
        Ok(Redirect {
            url: data.authorization_url,
            reference: charge.reference,
        })
    }
}

impl Gateway<Select<By<Confirmation, payment::Reference>>> for Paystack {
    type Ok = Confirmation;
    type Err = Traced<Error>;

    /// Verifies the charge behind the provided [`payment::Reference`] with
    /// the gateway, succeeding only once it's actually settled.
    async fn execute(
        &self,
        Select(by): Select<By<Confirmation, payment::Reference>>,
    ) -> Result<Self::Ok, Self::Err> {
        let reference = by.into_inner();

        let response: Envelope<Verified> = self
            .client
            .get(format!(
                "{}/transaction/verify/{reference}",
                self.base_url,
            ))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?
            .json()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        response
            .accepted()
            .map_err(tracerr::wrap!())?
            .try_into()
            .map_err(tracerr::wrap!())
    }
}

/// Converts the provided [`Money`] into the smallest currency unit the
/// gateway charges in (e.g. kobo for NGN).
fn minor_units(amount: &Money) -> Option<u64> {
    (amount.amount * Decimal::from(100)).trunc().to_u64()
}

/// Common envelope of every [Paystack] API response.
///
/// [Paystack]: https://paystack.com
#[derive(Clone, Debug, Deserialize)]
struct Envelope<T> {
    /// Whether the request itself was accepted.
    status: bool,

    /// Human-readable outcome description.
    message: String,

    /// Payload of an accepted request.
    data: Option<T>,
}

impl<T> Envelope<T> {
    /// Returns the payload of this [`Envelope`], provided the request was
    /// accepted.
    fn accepted(self) -> Result<T, Error> {
        if self.status {
            self.data.ok_or(Error::Rejected(self.message))
        } else {
            Err(Error::Rejected(self.message))
        }
    }
}

/// Body of a `POST /transaction/initialize` request.
#[derive(Clone, Debug, serde::Serialize)]
struct InitializeRequest {
    /// Contact the gateway sends its receipt to.
    email: String,

    /// Amount in the smallest currency unit.
    amount: u64,

    /// ISO currency code of the amount.
    currency: String,

    /// Idempotency reference of the charge.
    reference: String,
}

/// Payload of an accepted `POST /transaction/initialize` request.
#[derive(Clone, Debug, Deserialize)]
struct Initialized {
    /// Checkout URL the client completes the payment at.
    authorization_url: String,
}

/// Payload of an accepted `GET /transaction/verify` request.
#[derive(Clone, Debug, Deserialize)]
struct Verified {
    /// Settlement state of the charge.
    status: String,

    /// Paid amount in the smallest currency unit.
    amount: u64,

    /// ISO currency code of the paid amount.
    currency: String,

    /// [RFC 3339] settlement instant.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    paid_at: Option<String>,
}

impl TryFrom<Verified> for Confirmation {
    type Error = Error;

    fn try_from(verified: Verified) -> Result<Self, Self::Error> {
        if verified.status != "success" {
            return Err(Error::Unpaid(verified.status));
        }
        Ok(Self {
            amount: Money {
                amount: Decimal::new(
                    verified.amount.try_into().or(Err(Error::Amount))?,
                    2,
                ),
                currency: Currency::from_str(&verified.currency)
                    .map_err(Error::Currency)?,
            },
            paid_at: verified
                .paid_at
                .as_deref()
                .map(common::DateTime::from_rfc3339)
                .transpose()
                .map_err(Error::PaidAt)?
                .map(|dt| dt.coerce()),
        })
    }
}

/// Error of initializing a [`Paystack`] gateway.
#[derive(Debug, Display, From, StdError)]
#[display("cannot initialize `Paystack` gateway: {_0}")]
pub struct InitError(reqwest::Error);

#[cfg(test)]
mod spec {
    use common::money::Currency;
    use rust_decimal::Decimal;

    use crate::infra::payments::{Confirmation, Error};

    use super::{minor_units, Envelope, Verified};

    #[test]
    fn money_converts_to_minor_units_exactly() {
        let money = common::Money {
            amount: Decimal::new(150_050, 2),
            currency: Currency::Ngn,
        };

        assert_eq!(minor_units(&money), Some(150_050));
    }

    #[test]
    fn settled_verification_parses_into_confirmation() {
        let raw = r#"{
            "status": true,
            "message": "Verification successful",
            "data": {
                "status": "success",
                "amount": 150000,
                "currency": "NGN",
                "paid_at": "2024-08-22T10:00:00.000Z",
                "channel": "card"
            }
        }"#;

        let envelope: Envelope<Verified> = serde_json::from_str(raw).unwrap();
        let confirmation: Confirmation =
            envelope.accepted().unwrap().try_into().unwrap();

        assert_eq!(confirmation.amount.amount, Decimal::new(150_000, 2));
        assert_eq!(confirmation.amount.currency, Currency::Ngn);
        assert!(confirmation.paid_at.is_some());
    }

    #[test]
    fn unsettled_verification_is_reported_unpaid() {
        let raw = r#"{
            "status": true,
            "message": "Verification successful",
            "data": {
                "status": "abandoned",
                "amount": 150000,
                "currency": "NGN",
                "paid_at": null
            }
        }"#;

        let envelope: Envelope<Verified> = serde_json::from_str(raw).unwrap();
        let outcome: Result<Confirmation, _> =
            envelope.accepted().unwrap().try_into();

        assert!(matches!(
            outcome,
            Err(Error::Unpaid(state)) if state == "abandoned",
        ));
    }

    #[test]
    fn refused_envelope_surfaces_gateway_message() {
        let raw = r#"{
            "status": false,
            "message": "Transaction reference not found"
        }"#;

        let envelope: Envelope<Verified> = serde_json::from_str(raw).unwrap();

        assert!(matches!(
            envelope.accepted(),
            Err(Error::Rejected(message))
                if message == "Transaction reference not found"
        ));
    }
}
