//! [`CleanExpiredSessions`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Delete, Perform, Start};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::member::{session, Session},
    infra::{database, Database},
    Service,
};

use super::Task;

/// Configuration for [`CleanExpiredSessions`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between expired [`Session`]s sweeps.
    ///
    /// Raised to [`Config::MIN_INTERVAL`] if shorter.
    pub interval: time::Duration,
}

impl Config {
    /// Shortest [`Config::interval`] the [`Task`] runs with.
    pub const MIN_INTERVAL: time::Duration = time::Duration::from_millis(1);
}

/// [`Task`] for deleting expired [`Session`]s.
#[derive(Clone, Copy, Debug)]
pub struct CleanExpiredSessions<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db> Task<Start<By<CleanExpiredSessions<Self>, Config>>> for Service<Db>
where
    CleanExpiredSessions<Service<Db>>:
        Task<Perform<()>, Ok = u64, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<CleanExpiredSessions<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let task = CleanExpiredSessions {
            config: by.into_inner(),
            service: self.clone(),
        };

        let mut interval =
            interval(task.config.interval.max(Config::MIN_INTERVAL));
        loop {
            _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(0) => {}
                Ok(count) => {
                    log::debug!("deleted {count} expired `Session`s");
                }
                Err(e) => {
                    log::error!("`task::CleanExpiredSessions` failed: {e}");
                }
            }
        }
    }
}

impl<Db> Task<Perform<()>> for CleanExpiredSessions<Service<Db>>
where
    Db: Database<
        Delete<By<Session, session::ExpirationDateTime>>,
        Ok = u64,
        Err = Traced<database::Error>,
    >,
{
    /// Number of deleted [`Session`]s.
    type Ok = u64;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        self.service
            .database()
            .execute(Delete(By::new(session::ExpirationDateTime::now())))
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Error of [`CleanExpiredSessions`] execution.
pub type ExecutionError = Traced<database::Error>;

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        operations::{By, Insert, Perform, Start},
        DateTime,
    };
    use tokio::time;

    use crate::{
        domain::member::{self, session::Token, Session},
        spec, Task as _,
    };

    use super::{CleanExpiredSessions, Config};

    #[tokio::test]
    async fn deletes_only_expired_sessions() {
        let svc = spec::service(spec::config());
        let now = DateTime::now();
        let session = |expires_at: DateTime| {
            Session::new(
                &Token::generate().unwrap(),
                member::Id::from(1),
                expires_at.coerce(),
            )
        };
        let alive = session(now + Duration::from_secs(60));
        for s in [
            alive.clone(),
            session(now),
            session(now - Duration::from_secs(60)),
        ] {
            svc.database().execute(Insert(s)).await.unwrap();
        }

        let task = CleanExpiredSessions {
            config: Config {
                interval: Duration::from_secs(1),
            },
            service: svc.clone(),
        };
        let deleted = task.execute(Perform(())).await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(svc.database().sessions().await, [alive]);
    }

    #[tokio::test]
    async fn runs_with_zero_interval() {
        let svc = spec::service(spec::config());
        svc.database()
            .execute(Insert(Session::new(
                &Token::generate().unwrap(),
                member::Id::from(1),
                DateTime::now().coerce(),
            )))
            .await
            .unwrap();

        let started = time::timeout(
            Duration::from_millis(50),
            svc.execute(Start(By::<CleanExpiredSessions<_>, _>::new(Config {
                interval: Duration::ZERO,
            }))),
        )
        .await;

        assert!(started.is_err(), "`Task` must keep running");
        assert!(svc.database().sessions().await.is_empty());
    }
}
