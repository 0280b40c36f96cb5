//! [`Command`] for creating a [`Session`] of a [`Member`] (logging in).

use common::{
    operations::{
        By, Commit, Delete, Insert, Lock, Select, Transact, Transacted,
    },
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret as _, SecretBox};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::member::{session::Token, Password};
use crate::{
    domain::{
        member::{self, session, Session},
        Member,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a [`Session`] by [`Member`] credentials.
///
/// Any existing [`Session`]s of the [`Member`] are deleted, so only the created
/// one remains active.
#[derive(Debug)]
pub struct CreateMemberSession {
    /// [`member::Email`] of a [`Member`].
    pub email: member::Email,

    /// [`Password`] of a [`Member`].
    pub password: SecretBox<member::Password>,
}

/// Output of [`CreateMemberSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Token`] of the created [`Session`].
    pub token: session::Token,

    /// [`Member`] whose [`Session`] has been created.
    pub member: Member,

    /// [`DateTime`] when the [`Session`] expires.
    pub expires_at: session::ExpirationDateTime,
}

impl<Db> Command<CreateMemberSession> for Service<Db>
where
    Db: for<'l> Database<
            Select<By<Option<Member>, &'l member::Email>>,
            Ok = Option<Member>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<member::PasswordHash>, member::Id>>,
            Ok = Option<member::PasswordHash>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Member, member::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Session, member::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        > + Database<Insert<Session>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateMemberSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateMemberSession { email, password } = cmd;

        let member = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let Some(member) = member else {
            // Unknown emails take as long as wrong passwords do.
            _ = member::PasswordHash::verify_none(password.expose_secret());
            return Err(tracerr::new!(E::NotFound(email)));
        };

        let hash = self
            .database()
            .execute(Select(By::<Option<member::PasswordHash>, _>::new(
                member.id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !hash.is_some_and(|h| h.verify(password.expose_secret())) {
            return Err(tracerr::new!(E::PasswordMismatch(member.id)));
        }

        let token =
            session::Token::generate().map_err(tracerr::from_and_wrap!(=> E))?;
        let expires_at = DateTime::now()
            .saturating_add(self.config().session_lifetime)
            .coerce();
        let session = Session::new(&token, member.id, expires_at);

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        // Concurrent logins of the same `Member` must not both survive.
        tx.execute(Lock(By::<Member, _>::new(member.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Delete(By::<Session, _>::new(member.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Insert(session))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        log::debug!("created new `Session` for `Member(id: {})`", member.id);

        Ok(Output {
            token,
            member,
            expires_at,
        })
    }
}

/// Error of [`CreateMemberSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Member`] with the provided [`member::Email`] doesn't exist.
    #[display("`Member` with `{_0}` email doesn't exist")]
    #[from(ignore)]
    NotFound(#[error(not(source))] member::Email),

    /// Provided [`Password`] doesn't match the stored one.
    #[display("Wrong `Password` of `Member(id: {_0})`")]
    #[from(ignore)]
    PasswordMismatch(#[error(not(source))] member::Id),

    /// [`Token`] generation failed.
    #[display("Failed to generate `session::Token`: {_0}")]
    TokenGeneration(getrandom::Error),
}

#[cfg(test)]
pub(crate) mod spec {
    use secrecy::SecretBox;

    use crate::{
        command::register_member::spec::register,
        domain::member::{Email, Password},
        spec, Command as _,
    };

    use super::{CreateMemberSession, ExecutionError};

    pub(crate) fn login(email: &str, password: &str) -> CreateMemberSession {
        CreateMemberSession {
            email: Email::new(email).unwrap(),
            password: SecretBox::new(Box::new(Password::new(password).unwrap())),
        }
    }

    #[tokio::test]
    async fn creates_session() {
        let svc = spec::service(spec::config());
        let registered = svc
            .execute(register("john@example.com", "correct horse"))
            .await
            .unwrap();

        let out = svc
            .execute(login("John@example.com", "correct horse"))
            .await
            .unwrap();

        assert_eq!(out.member.id, registered.member.id);
        assert_ne!(out.token, registered.token);
        let sessions = svc.database().sessions().await;
        assert_eq!(sessions.len(), 1, "previous `Session` is not deleted");
        assert_eq!(sessions[0].id, out.token.id());
        assert_eq!(sessions[0].expires_at, out.expires_at);
    }

    #[tokio::test]
    async fn concurrent_logins_leave_single_session() {
        let svc = spec::service(spec::config());
        _ = svc
            .execute(register("john@example.com", "correct horse"))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            svc.execute(login("john@example.com", "correct horse")),
            svc.execute(login("john@example.com", "correct horse")),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        let sessions = svc.database().sessions().await;
        assert_eq!(sessions.len(), 1);
        assert!(
            sessions[0].id == first.token.id()
                || sessions[0].id == second.token.id(),
        );
    }

    #[tokio::test]
    async fn distinguishes_unknown_email_and_wrong_password() {
        let svc = spec::service(spec::config());
        _ = svc
            .execute(register("john@example.com", "correct horse"))
            .await
            .unwrap();

        let unknown = svc
            .execute(login("jane@example.com", "correct horse"))
            .await
            .unwrap_err();
        let wrong = svc
            .execute(login("john@example.com", "wrong horse"))
            .await
            .unwrap_err();

        assert!(matches!(unknown.as_ref(), ExecutionError::NotFound(_)));
        assert!(matches!(wrong.as_ref(), ExecutionError::PasswordMismatch(_)));
        assert_eq!(svc.database().sessions().await.len(), 1);
    }
}
