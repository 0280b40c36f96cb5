//! [`Command`] for validating a [`Session`] of a [`Member`].

use common::{
    operations::{By, Select, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Member;
use crate::{
    domain::member::{session, Session},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for validating a [`Session`] by its [`session::Token`].
///
/// [`Session`] expiring within the configured refresh buffer is extended by
/// the configured lifetime.
#[derive(Clone, Debug, From)]
pub struct ValidateMemberSession {
    /// [`session::Token`] of the [`Session`] to validate.
    pub token: session::Token,
}

/// Output of [`ValidateMemberSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// Validated [`Session`], with its actual expiration.
    pub session: Session,

    /// Indicator whether the [`Session`] has been extended.
    pub refreshed: bool,
}

impl<Db> Command<ValidateMemberSession> for Service<Db>
where
    Db: for<'l> Database<
            Select<By<Option<Session>, &'l session::Id>>,
            Ok = Option<Session>,
            Err = Traced<database::Error>,
        > + Database<Update<Session>, Ok = bool, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ValidateMemberSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;
        use session::State;

        let id = cmd.token.id();
        let mut session = self
            .database()
            .execute(Select(By::new(&id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::NoSession)
            .map_err(tracerr::wrap!())?;

        let now = DateTime::now();
        match session.state(now, self.config().session_refresh_buffer) {
            State::Valid => Ok(Output {
                session,
                refreshed: false,
            }),
            State::Expired => Err(tracerr::new!(E::InvalidSession)),
            State::Refreshable => {
                session.extend(
                    now.saturating_add(self.config().session_lifetime).coerce(),
                );
                let updated = self
                    .database()
                    .execute(Update(session.clone()))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                // Deleted concurrently by logging out or in again.
                if !updated {
                    return Err(tracerr::new!(E::NoSession));
                }

                log::debug!(
                    "extended `Session` of `Member(id: {})`",
                    session.member_id,
                );

                Ok(Output {
                    session,
                    refreshed: true,
                })
            }
        }
    }
}

/// Error of [`ValidateMemberSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Session`] doesn't exist.
    #[display("`Session` doesn't exist")]
    #[from(ignore)]
    NoSession,

    /// [`Session`] has expired.
    #[display("`Session` has expired")]
    #[from(ignore)]
    InvalidSession,
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{datetime::SignedDuration, operations::Insert, DateTime};

    use crate::{
        command::{
            create_member_session::spec::login,
            register_member::spec::register,
        },
        domain::member::{self, session::Token, Session},
        spec, Command as _,
    };

    use super::{ExecutionError, ValidateMemberSession};

    #[tokio::test]
    async fn keeps_fresh_session_intact() {
        let svc = spec::service(spec::config());
        let out = svc
            .execute(register("john@example.com", "correct horse"))
            .await
            .unwrap();

        let validated = svc
            .execute(ValidateMemberSession { token: out.token })
            .await
            .unwrap();

        assert!(!validated.refreshed);
        assert_eq!(validated.session.member_id, out.member.id);
        assert_eq!(validated.session.expires_at, out.expires_at);
    }

    #[tokio::test]
    async fn extends_session_within_refresh_buffer() {
        let mut config = spec::config();
        config.session_refresh_buffer = SignedDuration::hours(2);
        let svc = spec::service(config);
        let token = Token::generate().unwrap();
        let expires_at = (DateTime::now() + Duration::from_secs(3600)).coerce();
        svc.database()
            .execute(Insert(Session::new(
                &token,
                member::Id::from(1),
                expires_at,
            )))
            .await
            .unwrap();

        let validated = svc
            .execute(ValidateMemberSession {
                token: token.clone(),
            })
            .await
            .unwrap();

        assert!(validated.refreshed);
        assert!(validated.session.expires_at > expires_at);
        let stored = svc.database().sessions().await;
        assert_eq!(stored[0].id, token.id());
        assert_eq!(stored[0].expires_at, validated.session.expires_at);
    }

    #[tokio::test]
    async fn survives_unbounded_buffer_and_lifetime() {
        let mut config = spec::config();
        config.session_refresh_buffer = SignedDuration::MAX;
        config.session_lifetime = Duration::MAX;
        let svc = spec::service(config);
        let out = svc
            .execute(register("john@example.com", "correct horse"))
            .await
            .unwrap();

        let validated = svc
            .execute(ValidateMemberSession { token: out.token })
            .await
            .unwrap();

        assert!(validated.refreshed);
        assert!(validated.session.expires_at >= out.expires_at);
    }

    #[tokio::test]
    async fn rejects_expired_session() {
        let svc = spec::service(spec::config());
        let token = Token::generate().unwrap();
        svc.database()
            .execute(Insert(Session::new(
                &token,
                member::Id::from(1),
                DateTime::now().coerce(),
            )))
            .await
            .unwrap();

        let err = svc
            .execute(ValidateMemberSession { token })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::InvalidSession));
    }

    #[tokio::test]
    async fn rejects_unknown_token() {
        let svc = spec::service(spec::config());

        let err = svc
            .execute(ValidateMemberSession {
                token: Token::generate().unwrap(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::NoSession));
    }

    #[tokio::test]
    async fn logging_in_again_invalidates_previous_token() {
        let svc = spec::service(spec::config());
        _ = svc
            .execute(register("john@example.com", "correct horse"))
            .await
            .unwrap();
        let first = svc
            .execute(login("john@example.com", "correct horse"))
            .await
            .unwrap();
        let second = svc
            .execute(login("john@example.com", "correct horse"))
            .await
            .unwrap();

        let err = svc
            .execute(ValidateMemberSession { token: first.token })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::NoSession));

        _ = svc
            .execute(ValidateMemberSession {
                token: second.token,
            })
            .await
            .unwrap();
    }
}
