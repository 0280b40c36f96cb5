//! [`Query`] collection related to a single [`Member`].

use common::operations::{By, Select};
use tracerr::Traced;

#[cfg(doc)]
use crate::domain::Role;
use crate::{
    domain::{member, permission, role, Member},
    infra::{database, Database},
    Service,
};

use super::{DatabaseQuery, Query};

/// Queries a [`Member`] by its [`member::Id`].
pub type ById = DatabaseQuery<By<Option<Member>, member::Id>>;

/// Queries effective [`permission::Collection`] of a [`Member`].
///
/// Unites [`permission::Collection`]s of all the [`Role`]s assigned to the
/// [`Member`], preserving their order. Duplicates are kept.
#[derive(Clone, Copy, Debug)]
pub struct Permissions {
    /// ID of the [`Member`] to query [`permission::Collection`] of.
    pub member_id: member::Id,
}

impl<Db> Query<Permissions> for Service<Db>
where
    Db: Database<
            Select<By<Vec<role::Role>, member::Id>>,
            Ok = Vec<role::Role>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<permission::Collection, role::Id>>,
            Ok = permission::Collection,
            Err = Traced<database::Error>,
        >,
{
    type Ok = permission::Collection;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Permissions { member_id }: Permissions,
    ) -> Result<Self::Ok, Self::Err> {
        let roles = self
            .database()
            .execute(Select(By::<Vec<role::Role>, _>::new(member_id)))
            .await
            .map_err(tracerr::wrap!())?;

        let mut permissions = permission::Collection::new();
        for role in roles {
            permissions.append(
                self.database()
                    .execute(Select(By::<permission::Collection, _>::new(
                        role.id,
                    )))
                    .await
                    .map_err(tracerr::wrap!())?,
            );
        }
        Ok(permissions)
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        domain::{
            member,
            permission::{self, spec::permission},
            role::{self, spec::role},
        },
        spec, Query as _,
    };

    use super::Permissions;

    fn names(collection: &permission::Collection) -> Vec<&str> {
        collection.names().map(AsRef::as_ref).collect()
    }

    #[tokio::test]
    async fn member_without_roles_has_no_permissions() {
        let svc = spec::service(spec::config());

        let permissions = svc
            .execute(Permissions {
                member_id: member::Id::from(1),
            })
            .await
            .unwrap();

        assert!(permissions.is_empty());
        assert!(permissions.contains_all(["view:event"]).is_err());
        assert!(permissions.contains_all(Vec::<&str>::new()).is_ok());
    }

    #[tokio::test]
    async fn unites_permissions_of_roles_in_order() {
        let svc = spec::service(spec::config());
        let db = svc.database();
        db.add_role(
            role(1, "editor"),
            vec![permission(1, "edit:event"), permission(2, "view:event")],
        )
        .await;
        db.add_role(
            role(2, "viewer"),
            vec![permission(2, "view:event"), permission(3, "view:artist")],
        )
        .await;
        db.add_role(role(3, "admin"), vec![permission(4, "delete:event")])
            .await;
        let member_id = member::Id::from(7);
        db.assign_role(member_id, role::Id::from(1)).await;
        db.assign_role(member_id, role::Id::from(2)).await;

        let permissions =
            svc.execute(Permissions { member_id }).await.unwrap();

        assert_eq!(
            names(&permissions),
            ["edit:event", "view:event", "view:event", "view:artist"],
        );
        assert!(permissions.contains_all(["view:artist", "edit:event"]).is_ok());
        assert!(permissions.contains_all(["delete:event"]).is_err());
    }
}
