//! [`Command`] for authorizing a [`Member`] to perform some action.

use derive_more::{Display, Error, From};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::{Member, Role};
use crate::{
    domain::{member, permission},
    infra::database,
    query, Query, Service,
};

use super::Command;

/// [`Command`] checking that a [`Member`] holds all the required
/// [`permission::Name`]s through its [`Role`]s.
#[derive(Clone, Debug)]
pub struct AuthorizeMember {
    /// ID of the [`Member`] to authorize.
    pub member_id: member::Id,

    /// [`permission::Name`]s the [`Member`] must hold.
    pub required: Vec<permission::Name>,
}

impl<Db> Command<AuthorizeMember> for Service<Db>
where
    Self: Query<
        query::member::Permissions,
        Ok = permission::Collection,
        Err = Traced<database::Error>,
    >,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: AuthorizeMember,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AuthorizeMember {
            member_id,
            required,
        } = cmd;

        self.execute(query::member::Permissions { member_id })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .contains_all(&required)
            .map_err(tracerr::from_and_wrap!(=> E))
    }
}

/// Error of [`AuthorizeMember`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    ///
    /// [`Database`]: crate::infra::Database
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Member`] lacks some required [`permission::Name`].
    #[display("`Member` is not authorized: {_0}")]
    MissingPermissions(permission::Missing),
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{
            member,
            permission::spec::permission,
            role::{self, spec::role},
        },
        spec, Command as _,
    };

    use super::{AuthorizeMember, ExecutionError};

    fn authorize(member_id: member::Id, required: &[&str]) -> AuthorizeMember {
        AuthorizeMember {
            member_id,
            required: required.iter().map(|n| n.parse().unwrap()).collect(),
        }
    }

    #[tokio::test]
    async fn checks_permissions_granted_by_roles() {
        let svc = spec::service(spec::config());
        svc.database()
            .add_role(
                role(1, "editor"),
                vec![permission(1, "edit:event"), permission(2, "view:event")],
            )
            .await;
        let editor = member::Id::from(1);
        svc.database().assign_role(editor, role::Id::from(1)).await;

        svc.execute(authorize(editor, &["edit:event"])).await.unwrap();
        svc.execute(authorize(editor, &["view:event", "edit:event"]))
            .await
            .unwrap();
        let err = svc
            .execute(authorize(editor, &["edit:event", "delete:event"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::MissingPermissions(m) if m.0 == "delete:event",
        ));
    }

    #[tokio::test]
    async fn member_without_roles_passes_only_empty_requirement() {
        let svc = spec::service(spec::config());
        let nobody = member::Id::from(1);

        svc.execute(authorize(nobody, &[])).await.unwrap();
        let err = svc
            .execute(authorize(nobody, &["view:event"]))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::MissingPermissions(_)));
    }
}
