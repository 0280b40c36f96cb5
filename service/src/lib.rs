//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
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
pub mod infra;
pub mod query;
pub mod task;

use std::time::Duration;

use common::{
    datetime::SignedDuration,
    operations::{By, Start},
};

#[cfg(doc)]
use infra::Database;

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Lifetime of a newly created or extended [`domain::member::Session`].
    pub session_lifetime: Duration,

    /// Trailing window before a [`domain::member::Session`] expiration,
    /// during which the [`domain::member::Session`] is extended on
    /// validation.
    pub session_refresh_buffer: SignedDuration,

    /// [`task::CleanExpiredSessions`] configuration.
    pub clean_expired_sessions: task::clean_expired_sessions::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,
}

impl<Db> Service<Db> {
    /// Creates a new [`Service`] with the provided parameters, along with the
    /// [`task::Background`] its [`Task`]s run in.
    pub fn new(config: Config, database: Db) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::CleanExpiredSessions<Self>,
                        task::clean_expired_sessions::Config,
                    >,
                >,
                Ok = (),
                Err: std::error::Error,
            > + Clone
            + 'static,
    {
        let this = Service { config, database };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("CleanExpiredSessions", async move {
            svc.execute(Start(By::new(svc.config().clean_expired_sessions)))
                .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }
}

#[cfg(test)]
pub(crate) mod spec {
    use std::time::Duration;

    use common::datetime::SignedDuration;

    use crate::{infra::Memory, task, Config, Service};

    /// Default [`Config`] for tests.
    pub(crate) fn config() -> Config {
        Config {
            session_lifetime: Duration::from_secs(24 * 60 * 60),
            session_refresh_buffer: SignedDuration::hours(1),
            clean_expired_sessions: task::clean_expired_sessions::Config {
                interval: Duration::from_secs(60 * 60),
            },
        }
    }

    /// Creates a [`Service`] over an empty [`Memory`] database.
    pub(crate) fn service(config: Config) -> Service<Memory> {
        Service {
            config,
            database: Memory::new(),
        }
    }
}
