//! Service contains the business logic of the consultation platform.
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod event;
pub mod infra;
pub mod query;
pub mod read;
pub mod room;
pub mod task;

use std::{error::Error, time::Duration};

use common::operations::{By, Perform, Start};
use derive_more::Debug;
use tokio::sync::broadcast;

#[cfg(doc)]
use infra::{Directory, Gateway, Storage};

use crate::{
    event::Event,
    infra::{
        notify::{self, Notice},
        Notifier,
    },
};

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// [JWT] encoding key for minting client tokens.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_encoding_key: jsonwebtoken::EncodingKey,

    /// [JWT] decoding key for verifying client tokens.
    ///
    /// [JWT]: https://datatracker.ietf.org/doc/html/rfc7519
    #[debug(skip)]
    pub jwt_decoding_key: jsonwebtoken::DecodingKey,

    /// Time a paid booking stays engageable before the sweeper withdraws it.
    pub booking_timeout: Duration,

    /// [`task::SweepSessions`] configuration.
    pub sweep_sessions: task::sweep_sessions::Config,
}

/// Session engine of the platform.
///
/// Generic over its [`Storage`], payment [`Gateway`] and [`Professional`]
/// [`Directory`], so tests plug in-memory fakes into the very same machinery
/// the application runs.
///
/// [`Professional`]: domain::Professional
#[derive(Clone, Debug)]
pub struct Service<St, Gw, Dir> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Storage`] of this [`Service`].
    storage: St,

    /// Payment [`Gateway`] of this [`Service`].
    gateway: Gw,

    /// [`Professional`] [`Directory`] of this [`Service`].
    ///
    /// [`Professional`]: domain::Professional
    directory: Dir,

    /// Live chat room [`room::Router`] of this [`Service`].
    rooms: room::Router,

    /// Lifecycle [`Event`] [`event::Channel`] of this [`Service`].
    events: event::Channel,
}

impl<St, Gw, Dir> Service<St, Gw, Dir> {
    /// Creates a new [`Service`] with the provided parameters, alongside the
    /// [`task::Background`] environment driving its workers: the
    /// [`task::SweepSessions`] loop, the room watcher and the notification
    /// relay.
    pub fn new<Nt>(
        config: Config,
        storage: St,
        gateway: Gw,
        directory: Dir,
        notifier: Nt,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::SweepSessions<Self>,
                        task::sweep_sessions::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
        Nt: Notifier<Perform<Notice>, Ok = (), Err: Error> + 'static,
    {
        let this = Service {
            config,
            storage,
            gateway,
            directory,
            rooms: room::Router::new(),
            events: event::Channel::new(),
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(svc.config().sweep_sessions))).await
        });
        bg.spawn(this.rooms.clone().watch(this.events.subscribe()));
        bg.spawn(notify::relay(notifier, this.events.subscribe()));

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the [`Storage`] of this [`Service`].
    #[must_use]
    pub fn storage(&self) -> &St {
        &self.storage
    }

    /// Returns the payment [`Gateway`] of this [`Service`].
    #[must_use]
    pub fn gateway(&self) -> &Gw {
        &self.gateway
    }

    /// Returns the [`Professional`] [`Directory`] of this [`Service`].
    ///
    /// [`Professional`]: domain::Professional
    #[must_use]
    pub fn directory(&self) -> &Dir {
        &self.directory
    }

    /// Returns the live chat room [`room::Router`] of this [`Service`].
    #[must_use]
    pub fn rooms(&self) -> &room::Router {
        &self.rooms
    }

    /// Subscribes to all the lifecycle [`Event`]s published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Publishes the provided lifecycle [`Event`] to all current
    /// subscribers.
    pub(crate) fn publish(&self, event: Event) {
        self.events.publish(event);
    }
}

#[cfg(test)]
pub(crate) mod harness {
    //! Fixtures shared by tests across the crate.

    use std::{sync::Arc, time::Duration};

    use common::{
        operations::{By, Select, Start},
        DateTime, Hours, Money,
    };
    use dashmap::DashMap;
    use rust_decimal::Decimal;
    use tracerr::Traced;
    use uuid::Uuid;

    use crate::{
        domain::{
            client,
            identity::Staff,
            payment, professional,
            session::{self, Revision, Status},
            Identity, Professional, Session,
        },
        event,
        infra::{
            payments::{self, Charge, Confirmation, Redirect},
            Gateway, Memory, Roster,
        },
        room, task, Config, Service,
    };

    /// [`Service`] assembly the crate's tests run against.
    pub(crate) type TestService = Service<Memory, StubGateway, Roster>;

    /// Creates a [`TestService`] with no background workers running.
    ///
    /// Its [`Roster`] lists [`professional()`] and [`unverified()`].
    pub(crate) fn service() -> TestService {
        const SECRET: &[u8] = b"test-secret-not-for-production";

        Service {
            config: Config {
                jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                    SECRET,
                ),
                jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                    SECRET,
                ),
                booking_timeout: Duration::from_secs(900),
                sweep_sessions: task::sweep_sessions::Config {
                    interval: Duration::from_secs(30),
                },
            },
            storage: Memory::default(),
            gateway: StubGateway::default(),
            directory: Roster::new([professional(), unverified()]),
            rooms: room::Router::new(),
            events: event::Channel::new(),
        }
    }

    /// [`Money`] amount in Nigerian Naira.
    pub(crate) fn ngn(amount: u64) -> Money {
        Money {
            amount: Decimal::from(amount),
            currency: common::money::Currency::Ngn,
        }
    }

    /// Verified [`Professional`] charging 500 NGN per hour.
    pub(crate) fn professional() -> Professional {
        Professional {
            id: professional::Id::from(Uuid::from_u128(0x01)),
            price_per_hour: ngn(500),
            is_verified: true,
        }
    }

    /// [`Professional`] that hasn't passed verification.
    pub(crate) fn unverified() -> Professional {
        Professional {
            id: professional::Id::from(Uuid::from_u128(0x02)),
            price_per_hour: ngn(800),
            is_verified: false,
        }
    }

    /// Receipt [`payment::Contact`] of the test client.
    pub(crate) fn contact() -> payment::Contact {
        payment::Contact::new("client@example.com").unwrap()
    }

    /// Freshly booked [`Status::Pending`] [`Session`] with [`professional()`]
    /// for one hour at 500 NGN, paid under the provided reference.
    pub(crate) fn booked(reference: &str) -> Session {
        let now = DateTime::now();
        Session {
            id: session::Id::new(),
            professional_id: professional().id,
            client_handle: client::Handle::generate(),
            price_per_hour: ngn(500),
            hours: Hours::ONE,
            total_paid: ngn(500),
            payment_reference: payment::Reference::new(reference).unwrap(),
            extensions: Vec::new(),
            created_at: now.coerce(),
            booking_expires_at: (now + Duration::from_secs(900)).coerce(),
            started_at: None,
            expires_at: None,
            last_message_at: None,
            ended_at: None,
            ended_by: None,
            unread_for_professional: false,
            status: Status::Pending,
            revision: Revision::default(),
        }
    }

    /// Client-side [`Identity`] bound to the provided [`Session`].
    pub(crate) fn client(session: &Session) -> Identity {
        Identity::Client(client::Binding {
            session_id: session.id,
            handle: session.client_handle.clone(),
        })
    }

    /// Professional-side [`Identity`] of the provided [`Session`].
    pub(crate) fn staff(session: &Session) -> Identity {
        Identity::Staff(Staff {
            professional_id: session.professional_id,
        })
    }

    /// In-memory payment [`Gateway`] fake.
    ///
    /// Records initiated [`Charge`]s, and confirms only the references
    /// settled through [`StubGateway::settle()`]. Everything else reads as
    /// an abandoned checkout.
    #[derive(Clone, Debug, Default)]
    pub(crate) struct StubGateway {
        /// Initiated [`Charge`]s, by their reference.
        charges: Arc<DashMap<payment::Reference, Charge>>,

        /// Settled [`Confirmation`]s, by their reference.
        confirmations: Arc<DashMap<payment::Reference, Confirmation>>,
    }

    impl StubGateway {
        /// Marks the provided reference as settled for the provided amount.
        pub(crate) fn settle(
            &self,
            reference: payment::Reference,
            amount: Money,
        ) {
            _ = self.confirmations.insert(
                reference,
                Confirmation {
                    amount,
                    paid_at: Some(DateTime::now().coerce()),
                },
            );
        }

        /// Returns the [`Charge`] initiated under the provided reference.
        pub(crate) fn charged(
            &self,
            reference: &payment::Reference,
        ) -> Option<Charge> {
            self.charges.get(reference).map(|c| c.value().clone())
        }
    }

    impl Gateway<Start<Charge>> for StubGateway {
        type Ok = Redirect;
        type Err = Traced<payments::Error>;

        async fn execute(
            &self,
            Start(charge): Start<Charge>,
        ) -> Result<Self::Ok, Self::Err> {
            let reference = charge.reference.clone();
            _ = self.charges.insert(reference.clone(), charge);
            Ok(Redirect {
                url: format!("https://checkout.invalid/{reference}"),
                reference,
            })
        }
    }

    impl Gateway<Select<By<Confirmation, payment::Reference>>> for StubGateway {
        type Ok = Confirmation;
        type Err = Traced<payments::Error>;

        async fn execute(
            &self,
            Select(by): Select<By<Confirmation, payment::Reference>>,
        ) -> Result<Self::Ok, Self::Err> {
            self.confirmations
                .get(&by.into_inner())
                .map(|c| c.value().clone())
                .ok_or_else(|| {
                    tracerr::new!(payments::Error::Unpaid(
                        "abandoned".into()
                    ))
                })
        }
    }
}
