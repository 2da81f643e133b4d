//! [`Session`] definitions.

use std::time::Duration;

use common::{unit, DateTime, DateTimeOf, Hours, Money};
use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(doc)]
use crate::domain::{Message, Professional};
use crate::domain::{client, identity::Role, message, payment, professional};

/// Paid consultation session between an anonymous client and a
/// [`Professional`].
///
/// A [`Session`] is created in [`Status::Pending`] once its payment is
/// confirmed, becomes [`Status::Active`] when either party first engages, and
/// is closed exactly once into one of the terminal statuses
/// ([`Status::Expired`], [`Status::Ended`] or [`Status::Cancelled`]).
#[derive(Clone, Debug)]
pub struct Session {
    /// ID of this [`Session`].
    pub id: Id,

    /// ID of the [`Professional`] consulted in this [`Session`].
    pub professional_id: professional::Id,

    /// Pseudonymous [`client::Handle`] of the paying client.
    ///
    /// This is the only client identification a [`Session`] ever carries.
    pub client_handle: client::Handle,

    /// Per-hour rate this [`Session`] was sold at.
    pub price_per_hour: Money,

    /// Whole [`Hours`] purchased with the initial booking.
    pub hours: Hours,

    /// Total amount paid for this [`Session`], extensions included.
    pub total_paid: Money,

    /// [`payment::Reference`] of the initial booking charge.
    pub payment_reference: payment::Reference,

    /// [`Extension`]s applied to this [`Session`], in application order.
    pub extensions: Vec<Extension>,

    /// [`DateTime`] when this [`Session`] was booked.
    pub created_at: CreationDateTime,

    /// [`DateTime`] until which a [`Status::Pending`] booking may still be
    /// engaged before the sweeper cancels it.
    pub booking_expires_at: BookingDeadline,

    /// [`DateTime`] when this [`Session`] became [`Status::Active`].
    pub started_at: Option<ActivationDateTime>,

    /// [`DateTime`] when the clock of this [`Session`] runs out.
    ///
    /// Unset until activation, and pushed forward by every [`Extension`].
    pub expires_at: Option<ExpirationDateTime>,

    /// [`DateTime`] when the latest [`Message`] was recorded.
    pub last_message_at: Option<message::SentDateTime>,

    /// [`DateTime`] when this [`Session`] was closed.
    pub ended_at: Option<TerminationDateTime>,

    /// Party that closed this [`Session`].
    pub ended_by: Option<EndedBy>,

    /// Whether the [`Professional`] has client [`Message`]s not read yet.
    pub unread_for_professional: bool,

    /// Current [`Status`] of this [`Session`].
    pub status: Status,

    /// Optimistic concurrency [`Revision`] of this [`Session`].
    pub revision: Revision,
}

impl Session {
    /// Returns whether this [`Session`] is usable right `now`: it's
    /// [`Status::Active`] and its clock hasn't run out yet.
    #[must_use]
    pub fn is_active(&self, now: DateTime) -> bool {
        self.status == Status::Active
            && self.expires_at.is_some_and(|at| now.coerce() < at)
    }

    /// Returns the wall-clock time remaining on this [`Session`], or
    /// [`Duration::ZERO`] once its clock has run out.
    #[must_use]
    pub fn remaining(&self, now: DateTime) -> Duration {
        self.expires_at
            .map(|at| at.saturating_sub(now.coerce()))
            .unwrap_or_default()
    }

    /// Returns the [`Status`] of this [`Session`] as observed at `now`.
    ///
    /// An overdue [`Status::Active`] [`Session`] reads as [`Status::Expired`]
    /// even before the sweeper has committed the transition, so the observed
    /// lifecycle never depends on sweep lag.
    #[must_use]
    pub fn status_at(&self, now: DateTime) -> Status {
        if self.status == Status::Active && self.is_overdue(now) {
            Status::Expired
        } else {
            self.status
        }
    }

    /// Returns whether this [`Session`] still accepts traffic: it's
    /// [`Status::Pending`], or [`Status::Active`] with time left on the
    /// clock.
    #[must_use]
    pub fn is_open(&self, now: DateTime) -> bool {
        match self.status {
            Status::Pending => true,
            Status::Active => !self.is_overdue(now),
            Status::Expired | Status::Ended | Status::Cancelled => false,
        }
    }

    /// Returns whether the clock of this [`Session`] has run out.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime) -> bool {
        self.expires_at.is_some_and(|at| now.coerce() > at)
    }

    /// Activates this [`Session`], starting its paid clock.
    ///
    /// Returns whether the activation happened right now: activating an
    /// already [`Status::Active`] [`Session`] is a no-op, so racing parties
    /// cannot restart the clock.
    ///
    /// # Errors
    ///
    /// If this [`Session`] is in a terminal [`Status`] already.
    pub fn activate(
        &mut self,
        now: DateTime,
    ) -> Result<bool, ActivationError> {
        match self.status {
            Status::Pending => {
                self.start(now);
                Ok(true)
            }
            Status::Active => Ok(false),
            s @ (Status::Expired | Status::Ended | Status::Cancelled) => {
                Err(ActivationError(s))
            }
        }
    }

    /// Extends this [`Session`] by the provided [`Hours`], paid with the
    /// provided `amount` under the provided [`payment::Reference`].
    ///
    /// The expiry is pushed forward from the current [`Session::expires_at`],
    /// so time already elapsed is never refunded.
    ///
    /// # Errors
    ///
    /// - If this [`Session`] is not [`Status::Active`].
    /// - If the clock of this [`Session`] has run out already.
    /// - If the [`payment::Reference`] was applied to this [`Session`]
    ///   before.
    /// - If the `amount` is in a different currency than the paid total.
    pub fn extend(
        &mut self,
        now: DateTime,
        hours: Hours,
        reference: payment::Reference,
        amount: Money,
    ) -> Result<(), ExtensionError> {
        use ExtensionError as E;

        match self.status {
            Status::Active if self.is_overdue(now) => return Err(E::Expired),
            Status::Active => {}
            s @ (Status::Pending
            | Status::Expired
            | Status::Ended
            | Status::Cancelled) => return Err(E::NotActive(s)),
        }
        if self.payment_reference == reference
            || self.extensions.iter().any(|e| e.reference == reference)
        {
            return Err(E::DuplicateReference);
        }
        let Some(expires_at) = self.expires_at else {
            return Err(E::NotActive(self.status));
        };
        let total_paid =
            self.total_paid.checked_add(amount).ok_or(E::Currency)?;

        let expires_at = expires_at + hours.duration();
        self.extensions.push(Extension {
            at: now.coerce(),
            hours,
            amount,
            reference,
            expires_at,
        });
        self.expires_at = Some(expires_at);
        self.total_paid = total_paid;
        Ok(())
    }

    /// Notes a [`Message`] sent in this [`Session`] by the provided [`Role`],
    /// activating a [`Status::Pending`] [`Session`] along the way.
    ///
    /// Returns whether this very [`Message`] activated the [`Session`].
    ///
    /// # Errors
    ///
    /// If this [`Session`] doesn't accept traffic anymore.
    pub fn note_message(
        &mut self,
        now: DateTime,
        sender: Role,
    ) -> Result<bool, DeliveryError> {
        use DeliveryError as E;

        let activated = match self.status {
            Status::Pending => {
                self.start(now);
                true
            }
            Status::Active if self.is_overdue(now) => return Err(E::Expired),
            Status::Active => false,
            s @ (Status::Expired | Status::Ended | Status::Cancelled) => {
                return Err(E::Closed(s));
            }
        };
        self.last_message_at = Some(now.coerce());
        if sender == Role::Client {
            self.unread_for_professional = true;
        }
        Ok(activated)
    }

    /// Notes that the provided [`Role`] has read the [`Message`]s of this
    /// [`Session`].
    pub fn note_read(&mut self, reader: Role) {
        if reader == Role::Professional {
            self.unread_for_professional = false;
        }
    }

    /// Closes this [`Session`] as deliberately ended by the provided party.
    ///
    /// Returns whether the transition happened: closing an already closed
    /// [`Session`] is a no-op, so a duplicate "end session" action never
    /// fails nor overwrites who ended it first.
    pub fn terminate(&mut self, now: DateTime, by: EndedBy) -> bool {
        match self.status {
            Status::Pending | Status::Active => {
                self.close(Status::Ended, now, by);
                true
            }
            Status::Expired | Status::Ended | Status::Cancelled => false,
        }
    }

    /// Closes this [`Session`] as [`Status::Expired`], provided its clock has
    /// indeed run out by `now`.
    ///
    /// Returns whether the transition happened. The overdue condition is
    /// re-checked here, so a sweeper acting on a stale snapshot cannot expire
    /// a [`Session`] that was extended in the meantime.
    pub fn expire(&mut self, now: DateTime) -> bool {
        if self.status == Status::Active && self.is_overdue(now) {
            self.close(Status::Expired, now, EndedBy::Auto);
            true
        } else {
            false
        }
    }

    /// Closes this [`Session`] as [`Status::Cancelled`], provided it's still
    /// [`Status::Pending`] past its [`Session::booking_expires_at`] deadline.
    ///
    /// Returns whether the transition happened.
    pub fn cancel(&mut self, now: DateTime) -> bool {
        if self.status == Status::Pending
            && now.coerce() > self.booking_expires_at
        {
            self.close(Status::Cancelled, now, EndedBy::Auto);
            true
        } else {
            false
        }
    }

    /// Starts the paid clock of this [`Session`].
    fn start(&mut self, now: DateTime) {
        self.started_at = Some(now.coerce());
        self.expires_at = Some((now + self.hours.duration()).coerce());
        self.status = Status::Active;
    }

    /// Moves this [`Session`] into the provided terminal [`Status`].
    fn close(&mut self, status: Status, now: DateTime, by: EndedBy) {
        self.status = status;
        self.ended_at = Some(now.coerce());
        self.ended_by = Some(by);
    }
}

/// ID of a [`Session`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Status of a [`Session`] lifecycle.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[repr(u8)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Paid for, but not engaged by any party yet.
    Pending = 1,

    /// Clock is running.
    Active = 2,

    /// Clock ran out before anyone ended the [`Session`].
    Expired = 3,

    /// Deliberately ended by one of the parties.
    Ended = 4,

    /// Never engaged and withdrawn by the sweeper.
    Cancelled = 5,
}

impl Status {
    /// Returns whether this [`Status`] is terminal.
    ///
    /// A [`Session`] in a terminal [`Status`] never transitions again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        match self {
            Self::Pending | Self::Active => false,
            Self::Expired | Self::Ended | Self::Cancelled => true,
        }
    }
}

/// Party that closed a [`Session`].
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[repr(u8)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EndedBy {
    /// Anonymous client of the [`Session`].
    Client = 1,

    /// Consulted [`Professional`].
    ///
    /// [`Professional`]: crate::domain::Professional
    Professional = 2,

    /// The expiry sweeper.
    Auto = 3,
}

/// Paid prolongation applied to an already running [`Session`].
#[derive(Clone, Debug)]
pub struct Extension {
    /// [`DateTime`] when this [`Extension`] was applied.
    pub at: ExtensionDateTime,

    /// Whole [`Hours`] added by this [`Extension`].
    pub hours: Hours,

    /// Amount paid for this [`Extension`].
    pub amount: Money,

    /// [`payment::Reference`] of the charge paying this [`Extension`].
    pub reference: payment::Reference,

    /// [`Session::expires_at`] value this [`Extension`] moved the clock to.
    pub expires_at: ExpirationDateTime,
}

/// Optimistic concurrency revision of a [`Session`].
///
/// Bumped by the storage on every successful update, and compared there to
/// reject lost updates of concurrent read-modify-write cycles.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Revision(u64);

impl Revision {
    /// Returns the [`Revision`] following this one.
    #[must_use]
    pub const fn bumped(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Error of activating a [`Session`] closed in a terminal [`Status`].
#[derive(Clone, Copy, Debug, Display, derive_more::Error, Eq, PartialEq)]
#[display("`Session` cannot be activated from `{_0}` status")]
pub struct ActivationError(#[error(not(source))] pub Status);

/// Error of extending a [`Session`].
#[derive(Clone, Copy, Debug, Display, derive_more::Error, Eq, PartialEq)]
pub enum ExtensionError {
    /// [`Session`] is not [`Status::Active`].
    #[display("`Session` is `{_0}`, not `ACTIVE`")]
    NotActive(#[error(not(source))] Status),

    /// Clock of the [`Session`] has run out already.
    #[display("`Session` clock has run out already")]
    Expired,

    /// [`payment::Reference`] was applied to the [`Session`] before.
    #[display("payment reference was applied to this `Session` before")]
    DuplicateReference,

    /// Paid amount is in a different currency than the [`Session`] total.
    #[display("paid amount is in a different currency")]
    Currency,
}

/// Error of recording a [`Message`] into a [`Session`] accepting no more
/// traffic.
#[derive(Clone, Copy, Debug, Display, derive_more::Error, Eq, PartialEq)]
pub enum DeliveryError {
    /// [`Session`] is closed in a terminal [`Status`].
    #[display("`Session` is closed in `{_0}` status")]
    Closed(#[error(not(source))] Status),

    /// Clock of the [`Session`] has run out already.
    #[display("`Session` clock has run out already")]
    Expired,
}

/// [`DateTime`] when a [`Session`] was booked.
pub type CreationDateTime = DateTimeOf<(Session, unit::Creation)>;

/// [`DateTime`] until which a [`Status::Pending`] [`Session`] may still be
/// engaged.
pub type BookingDeadline = DateTimeOf<(Session, unit::Deadline)>;

/// [`DateTime`] when a [`Session`] became [`Status::Active`].
pub type ActivationDateTime = DateTimeOf<(Session, unit::Activation)>;

/// [`DateTime`] when a [`Session`] clock runs out.
pub type ExpirationDateTime = DateTimeOf<(Session, unit::Expiration)>;

/// [`DateTime`] when an [`Extension`] was applied to a [`Session`].
pub type ExtensionDateTime = DateTimeOf<(Extension, unit::Creation)>;

/// [`DateTime`] when a [`Session`] was closed.
pub type TerminationDateTime = DateTimeOf<(Session, unit::Termination)>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{DateTime, Hours, Money};

    use crate::domain::{client, identity::Role, payment};

    use super::{
        ActivationError, DeliveryError, EndedBy, ExtensionError, Revision,
        Session, Status,
    };

    fn ngn(amount: u64) -> Money {
        Money {
            amount: amount.into(),
            currency: common::money::Currency::Ngn,
        }
    }

    fn booked(hours: u16) -> (Session, DateTime) {
        let now = DateTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let hours = Hours::new(hours).unwrap();
        let session = Session {
            id: super::Id::new(),
            professional_id: crate::domain::professional::Id::new(),
            client_handle: client::Handle::generate(),
            price_per_hour: ngn(500),
            hours,
            total_paid: ngn(500 * u64::from(hours.get())),
            payment_reference: payment::Reference::new("PS-BOOK-1").unwrap(),
            extensions: Vec::new(),
            created_at: now.coerce(),
            booking_expires_at: (now + Duration::from_secs(24 * 3_600))
                .coerce(),
            started_at: None,
            expires_at: None,
            last_message_at: None,
            ended_at: None,
            ended_by: None,
            unread_for_professional: false,
            status: Status::Pending,
            revision: Revision::default(),
        };
        (session, now)
    }

    #[test]
    fn activation_stamps_expiry_from_activation_instant() {
        let (mut session, booked_at) = booked(2);
        let now = booked_at + Duration::from_secs(600);

        assert_eq!(session.activate(now), Ok(true));
        assert_eq!(session.status, Status::Active);
        assert_eq!(session.started_at, Some(now.coerce()));
        assert_eq!(
            session.expires_at,
            Some((now + Duration::from_secs(2 * 3_600)).coerce()),
        );
    }

    #[test]
    fn activation_is_idempotent_while_active() {
        let (mut session, now) = booked(1);

        assert_eq!(session.activate(now), Ok(true));
        let expires_at = session.expires_at;

        // A racing second activation must not restart the clock.
        assert_eq!(session.activate(now + Duration::from_secs(60)), Ok(false));
        assert_eq!(session.expires_at, expires_at);
    }

    #[test]
    fn activation_of_closed_session_is_rejected() {
        let (mut session, now) = booked(1);
        assert!(session.terminate(now, EndedBy::Client));

        assert_eq!(
            session.activate(now),
            Err(ActivationError(Status::Ended)),
        );
    }

    #[test]
    fn extension_pushes_expiry_and_accumulates_payment() {
        let (mut session, now) = booked(1);
        assert!(session.activate(now).unwrap());

        let mid = now + Duration::from_secs(30 * 60);
        session
            .extend(
                mid,
                Hours::new(2).unwrap(),
                payment::Reference::new("PS-EXT-1").unwrap(),
                ngn(1_000),
            )
            .unwrap();

        // 1h purchased + 2h extension, measured from activation.
        assert_eq!(
            session.expires_at,
            Some((now + Duration::from_secs(3 * 3_600)).coerce()),
        );
        assert_eq!(session.total_paid, ngn(1_500));
        assert_eq!(session.extensions.len(), 1);
        assert_eq!(
            session.remaining(mid),
            Duration::from_secs(3 * 3_600 - 30 * 60),
        );
    }

    #[test]
    fn extension_of_overdue_session_is_rejected() {
        let (mut session, now) = booked(1);
        assert!(session.activate(now).unwrap());

        let late = now + Duration::from_secs(3_601);
        assert_eq!(
            session.extend(
                late,
                Hours::ONE,
                payment::Reference::new("PS-EXT-1").unwrap(),
                ngn(500),
            ),
            Err(ExtensionError::Expired),
        );
    }

    #[test]
    fn extension_is_not_applied_twice_under_one_reference() {
        let (mut session, now) = booked(1);
        assert!(session.activate(now).unwrap());

        let reference = payment::Reference::new("PS-EXT-1").unwrap();
        session
            .extend(now, Hours::ONE, reference.clone(), ngn(500))
            .unwrap();
        let expires_at = session.expires_at;

        assert_eq!(
            session.extend(now, Hours::ONE, reference, ngn(500)),
            Err(ExtensionError::DuplicateReference),
        );
        assert_eq!(session.expires_at, expires_at);
        assert_eq!(session.total_paid, ngn(1_000));
    }

    #[test]
    fn extension_reusing_booking_reference_is_rejected() {
        let (mut session, now) = booked(1);
        assert!(session.activate(now).unwrap());

        assert_eq!(
            session.extend(
                now,
                Hours::ONE,
                session.payment_reference.clone(),
                ngn(500),
            ),
            Err(ExtensionError::DuplicateReference),
        );
    }

    #[test]
    fn first_message_activates_pending_session() {
        let (mut session, now) = booked(1);

        assert_eq!(session.note_message(now, Role::Client), Ok(true));
        assert_eq!(session.status, Status::Active);
        assert_eq!(session.last_message_at, Some(now.coerce()));
        assert!(session.unread_for_professional);
    }

    #[test]
    fn professional_message_does_not_flag_unread() {
        let (mut session, now) = booked(1);

        assert_eq!(session.note_message(now, Role::Professional), Ok(true));
        assert!(!session.unread_for_professional);

        assert_eq!(session.note_message(now, Role::Client), Ok(false));
        assert!(session.unread_for_professional);

        session.note_read(Role::Professional);
        assert!(!session.unread_for_professional);
    }

    #[test]
    fn message_into_closed_session_is_rejected() {
        let (mut session, now) = booked(1);
        assert!(session.activate(now).unwrap());
        assert!(session.terminate(now, EndedBy::Professional));

        assert_eq!(
            session.note_message(now, Role::Client),
            Err(DeliveryError::Closed(Status::Ended)),
        );
    }

    #[test]
    fn message_into_overdue_session_is_rejected() {
        let (mut session, now) = booked(1);
        assert!(session.activate(now).unwrap());

        let late = now + Duration::from_secs(3_601);
        assert_eq!(
            session.note_message(late, Role::Client),
            Err(DeliveryError::Expired),
        );
    }

    #[test]
    fn termination_happens_once() {
        let (mut session, now) = booked(1);
        assert!(session.activate(now).unwrap());

        assert!(session.terminate(now, EndedBy::Client));
        assert_eq!(session.status, Status::Ended);
        assert_eq!(session.ended_by, Some(EndedBy::Client));

        // The duplicate must not overwrite who ended the session first.
        assert!(!session.terminate(now, EndedBy::Professional));
        assert_eq!(session.ended_by, Some(EndedBy::Client));
    }

    #[test]
    fn expiry_flips_overdue_sessions_only() {
        let (mut session, now) = booked(1);
        assert!(session.activate(now).unwrap());

        assert!(!session.expire(now + Duration::from_secs(3_599)));
        assert_eq!(session.status, Status::Active);

        assert!(session.expire(now + Duration::from_secs(3_601)));
        assert_eq!(session.status, Status::Expired);
        assert_eq!(session.ended_by, Some(EndedBy::Auto));

        assert!(!session.expire(now + Duration::from_secs(7_200)));
    }

    #[test]
    fn expiry_rechecks_clock_after_extension() {
        let (mut session, now) = booked(1);
        assert!(session.activate(now).unwrap());
        session
            .extend(
                now,
                Hours::new(2).unwrap(),
                payment::Reference::new("PS-EXT-1").unwrap(),
                ngn(1_000),
            )
            .unwrap();

        // Overdue against the original expiry, but not the extended one.
        assert!(!session.expire(now + Duration::from_secs(3_601)));
        assert_eq!(session.status, Status::Active);
    }

    #[test]
    fn cancellation_withdraws_stale_pending_bookings_only() {
        let (mut session, now) = booked(1);

        assert!(!session.cancel(now));
        assert_eq!(session.status, Status::Pending);

        let late = now + Duration::from_secs(24 * 3_600 + 1);
        assert!(session.cancel(late));
        assert_eq!(session.status, Status::Cancelled);
        assert_eq!(session.ended_by, Some(EndedBy::Auto));
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let (mut session, now) = booked(1);
        assert_eq!(session.remaining(now), Duration::ZERO);

        assert!(session.activate(now).unwrap());
        assert_eq!(session.remaining(now), Duration::from_secs(3_600));
        assert_eq!(
            session.remaining(now + Duration::from_secs(2 * 3_600)),
            Duration::ZERO,
        );
    }

    #[test]
    fn observed_status_hides_sweep_lag() {
        let (mut session, now) = booked(1);
        assert!(session.activate(now).unwrap());

        assert_eq!(session.status_at(now), Status::Active);
        assert!(session.is_active(now));

        let late = now + Duration::from_secs(3_601);
        assert_eq!(session.status, Status::Active);
        assert_eq!(session.status_at(late), Status::Expired);
        assert!(!session.is_active(late));
        assert!(!session.is_open(late));
    }
}
