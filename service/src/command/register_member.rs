//! [`Command`] for registering a new [`Member`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted},
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

/// [`Command`] for registering a new [`Member`].
///
/// Starts a new [`Session`] for the registered [`Member`] right away.
#[derive(Debug)]
pub struct RegisterMember {
    /// [`member::Email`] of a new [`Member`].
    pub email: member::Email,

    /// [`Password`] of a new [`Member`].
    pub password: SecretBox<member::Password>,

    /// Repeated [`Password`] to be sure it's typed correctly.
    pub password_confirmation: SecretBox<member::Password>,

    /// First [`member::Name`] of a new [`Member`].
    pub first_name: member::Name,

    /// Last [`member::Name`] of a new [`Member`].
    pub last_name: member::Name,
}

/// Output of [`RegisterMember`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Token`] of the started [`Session`].
    pub token: session::Token,

    /// Registered [`Member`].
    pub member: Member,

    /// [`DateTime`] when the started [`Session`] expires.
    pub expires_at: session::ExpirationDateTime,
}

impl<Db> Command<RegisterMember> for Service<Db>
where
    Db: for<'l> Database<
            Select<By<Option<Member>, &'l member::Email>>,
            Ok = Option<Member>,
            Err = Traced<database::Error>,
        > + Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Insert<member::Draft>,
            Ok = member::Id,
            Err = Traced<database::Error>,
        > + Database<Insert<Session>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RegisterMember) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RegisterMember {
            email,
            password,
            password_confirmation,
            first_name,
            last_name,
        } = cmd;

        let existing = self
            .database()
            .execute(Select(By::new(&email)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if existing.is_some() {
            return Err(tracerr::new!(E::AlreadyExists(email)));
        }

        if password.expose_secret() != password_confirmation.expose_secret() {
            return Err(tracerr::new!(E::PasswordMismatch));
        }

        let password_hash = member::PasswordHash::new(password.expose_secret())
            .map_err(tracerr::from_and_wrap!(=> E))?;
        let token =
            session::Token::generate().map_err(tracerr::from_and_wrap!(=> E))?;

        let now = DateTime::now();
        let draft = member::Draft {
            email,
            first_name,
            last_name,
            password_hash,
            created_at: now.coerce(),
        };
        let expires_at =
            now.saturating_add(self.config().session_lifetime).coerce();

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        let id = match tx.execute(Insert(draft.clone())).await {
            Ok(id) => id,
            Err(e)
                if e.as_ref().is_unique_violation(Some(
                    database::MEMBER_EMAIL_CONSTRAINT,
                )) =>
            {
                return Err(tracerr::new!(E::AlreadyExists(draft.email)));
            }
            Err(e) => return Err(e).map_err(tracerr::map_from_and_wrap!(=> E)),
        };
        let session = Session::new(&token, id, expires_at);
        tx.execute(Insert(session))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let member = draft.into_member(id);
        log::debug!("registered `Member(id: {})` with a new `Session`", id);

        Ok(Output {
            token,
            member,
            expires_at,
        })
    }
}

/// Error of [`RegisterMember`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Member`] with the provided [`member::Email`] exists already.
    #[display("`Member` with `{_0}` email already exists")]
    #[from(ignore)]
    AlreadyExists(#[error(not(source))] member::Email),

    /// [`Password`] and its confirmation don't match.
    #[display("`Password` doesn't match its confirmation")]
    #[from(ignore)]
    PasswordMismatch,

    /// [`Password`] hashing failed.
    #[display("Failed to hash `Password`: {_0}")]
    PasswordHash(argon2::password_hash::Error),

    /// [`Token`] generation failed.
    #[display("Failed to generate `session::Token`: {_0}")]
    TokenGeneration(getrandom::Error),
}

#[cfg(test)]
pub(crate) mod spec {
    use secrecy::SecretBox;

    use crate::{
        domain::member::{Email, Name, Password},
        spec, Command as _,
    };

    use super::{ExecutionError, RegisterMember};

    pub(crate) fn register(email: &str, password: &str) -> RegisterMember {
        RegisterMember {
            email: Email::new(email).unwrap(),
            password: SecretBox::new(Box::new(Password::new(password).unwrap())),
            password_confirmation: SecretBox::new(Box::new(
                Password::new(password).unwrap(),
            )),
            first_name: Name::new("John").unwrap(),
            last_name: Name::new("Doe").unwrap(),
        }
    }

    #[tokio::test]
    async fn registers_member_with_session() {
        let svc = spec::service(spec::config());

        let out = svc
            .execute(register("John@Example.com", "correct horse"))
            .await
            .unwrap();

        assert_eq!(out.member.email.to_string(), "john@example.com");
        let sessions = svc.database().sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, out.token.id());
        assert_eq!(sessions[0].member_id, out.member.id);
        assert_eq!(sessions[0].expires_at, out.expires_at);
    }

    #[tokio::test]
    async fn rejects_mismatching_confirmation() {
        let svc = spec::service(spec::config());
        let mut cmd = register("john@example.com", "correct horse");
        cmd.password_confirmation =
            SecretBox::new(Box::new(Password::new("wrong horse").unwrap()));

        let err = svc.execute(cmd).await.unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::PasswordMismatch));
        assert_eq!(svc.database().members_count().await, 0);
        assert!(svc.database().sessions().await.is_empty());
    }

    #[tokio::test]
    async fn rejects_existing_email() {
        let svc = spec::service(spec::config());
        _ = svc
            .execute(register("john@example.com", "correct horse"))
            .await
            .unwrap();

        let err = svc
            .execute(register("JOHN@example.com", "another horse"))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::AlreadyExists(_)));
        assert_eq!(svc.database().members_count().await, 1);
        assert_eq!(svc.database().sessions().await.len(), 1);
    }
}
