//! [`Background`] environment for running [`Task`]s.

use std::{
    error::Error as StdError,
    future::{Future, IntoFuture},
};

use derive_more::Display;
use futures::{
    future::{self, LocalBoxFuture},
    FutureExt as _, TryFutureExt as _,
};
use tokio::task::{JoinHandle, LocalSet};

#[cfg(doc)]
use crate::Task;

/// Environment running long-living [`Task`]s on the current thread.
///
/// Resolves once all the spawned [`Task`]s are finished, or fails as soon as
/// any of them fails.
#[derive(Debug, Default)]
pub struct Background {
    /// [`LocalSet`] driving the spawned [`Task`]s.
    set: LocalSet,

    /// Spawned [`Task`]s along with their names.
    tasks: Vec<(&'static str, JoinHandle<Result<(), BoxedError>>)>,
}

/// Type-erased error of a [`Task`].
type BoxedError = Box<dyn StdError + 'static>;

impl Background {
    /// Spawns the provided [`Task`] future under the provided `name`.
    pub fn spawn<F, E>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + 'static,
        E: StdError + 'static,
    {
        let handle = self
            .set
            .spawn_local(task.map_err(|e| BoxedError::from(Box::new(e))));
        self.tasks.push((name, handle));
    }

    /// Returns names of the spawned [`Task`]s.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tasks.iter().map(|(name, _)| *name)
    }
}

impl IntoFuture for Background {
    type Output = Result<(), TaskError>;
    type IntoFuture = LocalBoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let Self { set, tasks } = self;

        let tasks = tasks.into_iter().map(|(name, handle)| {
            handle
                .map(move |res| {
                    res.map_err(BoxedError::from)
                        .and_then(|r| r)
                        .map_err(|source| TaskError { name, source })
                })
                .boxed_local()
        });

        future::try_join(
            set.map(Ok),
            future::try_join_all(tasks),
        )
        .map_ok(drop)
        .boxed_local()
    }
}

/// Error of a [`Task`] failed inside the [`Background`].
#[derive(Debug, Display)]
#[display("`{name}` task failed: {source}")]
pub struct TaskError {
    /// Name of the failed [`Task`].
    pub name: &'static str,

    /// Actual error of the [`Task`].
    pub source: BoxedError,
}

impl StdError for TaskError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.source)
    }
}

#[cfg(test)]
mod spec {
    use std::future::IntoFuture as _;

    use derive_more::{Display, Error};

    use super::Background;

    #[derive(Debug, Display, Error)]
    #[display("boom")]
    struct Boom;

    #[tokio::test]
    async fn resolves_when_all_tasks_finish() {
        let mut bg = Background::default();
        bg.spawn("first", async { Ok::<_, Boom>(()) });
        bg.spawn("second", async { Ok::<_, Boom>(()) });

        assert_eq!(bg.names().collect::<Vec<_>>(), ["first", "second"]);
        assert!(bg.into_future().await.is_ok());
    }

    #[tokio::test]
    async fn reports_name_of_failed_task() {
        let mut bg = Background::default();
        bg.spawn("healthy", async { Ok::<_, Boom>(()) });
        bg.spawn("broken", async { Err(Boom) });

        let err = bg.into_future().await.unwrap_err();
        assert_eq!(err.name, "broken");
        assert_eq!(err.to_string(), "`broken` task failed: boom");
    }
}
