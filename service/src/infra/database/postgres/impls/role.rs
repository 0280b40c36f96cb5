//! [`Role`]- and [`Permission`]-related [`Database`] implementations.

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::{member, permission, role, Permission, Role},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Vec<Role>, member::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Role>;
    type Err = Traced<database::Error>;

    /// Selects [`Role`]s assigned to the [`Member`] in their assignment order.
    ///
    /// [`Member`]: crate::domain::Member
    async fn execute(
        &self,
        Select(by): Select<By<Vec<Role>, member::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT r.id, r.name, r.display_name, r.description \
            FROM member_roles AS mr \
            INNER JOIN roles AS r ON r.id = mr.role_id \
            WHERE mr.member_id = $1::INT8 \
            ORDER BY mr.position, r.id";
        Ok(self
            .query(SQL, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| Role {
                id: row.get("id"),
                name: row.get("name"),
                display_name: row.get("display_name"),
                description: row.get("description"),
            })
            .collect())
    }
}

impl<C> Database<Select<By<permission::Collection, role::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = permission::Collection;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<permission::Collection, role::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT p.id, p.name, p.display_name, p.description \
            FROM role_permissions AS rp \
            INNER JOIN permissions AS p ON p.id = rp.permission_id \
            WHERE rp.role_id = $1::INT8 \
            ORDER BY rp.position, p.id";
        Ok(self
            .query(SQL, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| Permission {
                id: row.get("id"),
                name: row.get("name"),
                display_name: row.get("display_name"),
                description: row.get("description"),
            })
            .collect())
    }
}
