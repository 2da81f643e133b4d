//! [`SweepSessions`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{By, Perform, Select, Start, Update},
    DateTime,
};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{session, Session},
    event::Event,
    infra::{storage, Storage},
    read::session::{StaleBooking, TimedOut},
    Service,
};

use super::Task;

/// Configuration for [`SweepSessions`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between sweeps.
    pub interval: time::Duration,
}

/// [`Task`] closing [`Session`]s whose deadlines have passed.
///
/// [`Status::Active`] [`Session`]s past their expiry are closed as
/// [`Status::Expired`], and [`Status::Pending`] ones past their booking
/// deadline as [`Status::Cancelled`]. Parties observe expiry through
/// [`Session::status_at()`] immediately, so this [`Task`] only has to keep
/// the stored records converging, not to be punctual.
///
/// [`Status::Active`]: session::Status::Active
/// [`Status::Cancelled`]: session::Status::Cancelled
/// [`Status::Expired`]: session::Status::Expired
/// [`Status::Pending`]: session::Status::Pending
#[derive(Clone, Debug)]
pub struct SweepSessions<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<St, Gw, Dir> Task<Start<By<SweepSessions<Self>, Config>>>
    for Service<St, Gw, Dir>
where
    SweepSessions<Service<St, Gw, Dir>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<SweepSessions<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = SweepSessions {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::SweepSessions` failed: {e}");
            });
        }
    }
}

impl<St, Gw, Dir> Task<Perform<()>> for SweepSessions<Service<St, Gw, Dir>>
where
    St: Storage<
            Select<By<Vec<Session>, TimedOut>>,
            Ok = Vec<Session>,
            Err = Traced<storage::Error>,
        > + Storage<
            Select<By<Vec<Session>, StaleBooking>>,
            Ok = Vec<Session>,
            Err = Traced<storage::Error>,
        > + Storage<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<storage::Error>,
        > + Storage<Update<Session>, Ok = Session, Err = Traced<storage::Error>>,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let now = DateTime::now();
        let storage = self.service.storage();

        let timed_out = storage
            .execute(Select(By::<Vec<Session>, _>::new(TimedOut(now))))
            .await
            .map_err(tracerr::wrap!())?;
        for session in timed_out {
            let session_id = session.id;
            match self.commit(session, |s| s.expire(now)).await {
                Ok(true) => {
                    self.service.publish(Event::Expired { session_id });
                }
                Ok(false) => {}
                Err(e) => {
                    log::error!(
                        %session_id,
                        "failed to expire session: {e}",
                    );
                }
            }
        }

        let stale = storage
            .execute(Select(By::<Vec<Session>, _>::new(StaleBooking(now))))
            .await
            .map_err(tracerr::wrap!())?;
        for session in stale {
            let session_id = session.id;
            match self.commit(session, |s| s.cancel(now)).await {
                Ok(true) => {
                    self.service.publish(Event::Cancelled { session_id });
                }
                Ok(false) => {}
                Err(e) => {
                    log::error!(
                        %session_id,
                        "failed to cancel session: {e}",
                    );
                }
            }
        }

        Ok(())
    }
}

impl<St, Gw, Dir> SweepSessions<Service<St, Gw, Dir>>
where
    St: Storage<
            Select<By<Option<Session>, session::Id>>,
            Ok = Option<Session>,
            Err = Traced<storage::Error>,
        > + Storage<Update<Session>, Ok = Session, Err = Traced<storage::Error>>,
{
    /// Applies the provided closing transition to the provided [`Session`]
    /// and commits it, returning whether anything was committed.
    ///
    /// A concurrent write in between is absorbed by re-reading the
    /// [`Session`] and re-applying the transition once: the transition
    /// itself re-checks its conditions, so a [`Session`] extended or closed
    /// meanwhile is simply left alone.
    async fn commit(
        &self,
        session: Session,
        transition: impl Fn(&mut Session) -> bool,
    ) -> Result<bool, ExecutionError> {
        let storage = self.service.storage();
        let id = session.id;

        let mut attempt = session;
        for retried in [false, true] {
            if !transition(&mut attempt) {
                return Ok(false);
            }
            match storage.execute(Update(attempt)).await {
                Ok(_) => return Ok(true),
                Err(e)
                    if !retried
                        && matches!(
                            e.as_ref(),
                            storage::Error::StaleWrite(_),
                        ) =>
                {
                    let fresh = storage
                        .execute(Select(By::<Option<Session>, _>::new(id)))
                        .await
                        .map_err(tracerr::wrap!())?;
                    match fresh {
                        Some(f) => attempt = f,
                        None => return Ok(false),
                    }
                }
                Err(e) => return Err(e).map_err(tracerr::wrap!()),
            }
        }
        Ok(false)
    }
}

/// Error of [`SweepSessions`] execution.
pub type ExecutionError = Traced<storage::Error>;
