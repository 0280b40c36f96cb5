//! [`Database`]-related implementations.

#[cfg(not(any(test, feature = "memory", feature = "postgres")))]
compile_error!("either `memory` or `postgres` feature must be enabled");

#[cfg(any(test, feature = "memory"))]
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use derive_more::{Display, Error as StdError, From};

#[cfg(any(test, feature = "memory"))]
pub use self::memory::Memory;
#[cfg(feature = "postgres")]
pub use self::postgres::Postgres;

/// Database operation.
pub use common::Handler as Database;

/// Name of the unique constraint on [`Member`] emails.
///
/// [`Member`]: crate::domain::Member
pub const MEMBER_EMAIL_CONSTRAINT: &str = "members_email_key";

/// [`Database`] error.
#[derive(Debug, Display, From, StdError)]
pub enum Error {
    #[cfg(any(test, feature = "memory"))]
    /// [`Memory`] error.
    Memory(memory::Error),

    #[cfg(feature = "postgres")]
    /// [`Postgres`] error.
    Postgres(postgres::Error),
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            #[cfg(any(test, feature = "memory"))]
            Self::Memory(e) => e.is_unique_violation(constraint),
            #[cfg(feature = "postgres")]
            Self::Postgres(e) => e.is_unique_violation(constraint),
        }
    }
}

#[cfg(test)]
mod spec {
    use super::{memory, Error, MEMBER_EMAIL_CONSTRAINT};

    #[test]
    fn unique_violation_is_matched_by_constraint() {
        let err = Error::from(memory::Error::UniqueViolation(
            MEMBER_EMAIL_CONSTRAINT,
        ));

        assert!(err.is_unique_violation(None));
        assert!(err.is_unique_violation(Some(MEMBER_EMAIL_CONSTRAINT)));
        assert!(!err.is_unique_violation(Some("member_sessions_pkey")));
        assert!(!Error::from(memory::Error::TxFinished)
            .is_unique_violation(None));
    }
}
