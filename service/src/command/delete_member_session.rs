//! [`Command`] for deleting [`Session`]s of a [`Member`] (logging out).

use common::operations::{By, Delete, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::Member;
use crate::{
    domain::member::{self, session, Session},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for deleting all the [`Session`]s of the [`Member`] owning the
/// [`Session`] identified by the provided [`session::Token`].
///
/// Unknown [`session::Token`] is not an error, so this [`Command`] is
/// idempotent.
#[derive(Clone, Debug, From)]
pub struct DeleteMemberSession {
    /// [`session::Token`] of the [`Session`] to delete.
    pub token: session::Token,
}

impl<Db> Command<DeleteMemberSession> for Service<Db>
where
    Db: for<'l> Database<
            Select<By<Option<Session>, &'l session::Id>>,
            Ok = Option<Session>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<Session, member::Id>>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: DeleteMemberSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let id = cmd.token.id();
        let Some(session) = self
            .database()
            .execute(Select(By::new(&id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
        else {
            return Ok(());
        };

        self.database()
            .execute(Delete(By::<Session, _>::new(session.member_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        log::debug!(
            "deleted `Session`s of `Member(id: {})`",
            session.member_id,
        );

        Ok(())
    }
}

/// Error of [`DeleteMemberSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{
            create_member_session::spec::login,
            register_member::spec::register,
        },
        domain::member::session::Token,
        spec, Command as _,
    };

    use super::DeleteMemberSession;

    #[tokio::test]
    async fn deletes_all_sessions_of_member() {
        let svc = spec::service(spec::config());
        let john = svc
            .execute(register("john@example.com", "correct horse"))
            .await
            .unwrap();
        let jane = svc
            .execute(register("jane@example.com", "correct horse"))
            .await
            .unwrap();

        svc.execute(DeleteMemberSession { token: john.token })
            .await
            .unwrap();

        let sessions = svc.database().sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, jane.token.id());
    }

    #[tokio::test]
    async fn is_idempotent() {
        let svc = spec::service(spec::config());
        let out = svc
            .execute(register("john@example.com", "correct horse"))
            .await
            .unwrap();

        svc.execute(DeleteMemberSession {
            token: out.token.clone(),
        })
        .await
        .unwrap();
        svc.execute(DeleteMemberSession { token: out.token })
            .await
            .unwrap();
        svc.execute(DeleteMemberSession {
            token: Token::generate().unwrap(),
        })
        .await
        .unwrap();

        assert!(svc.database().sessions().await.is_empty());

        // Logging in again works after logging out.
        _ = svc
            .execute(login("john@example.com", "correct horse"))
            .await
            .unwrap();
        assert_eq!(svc.database().sessions().await.len(), 1);
    }
}
