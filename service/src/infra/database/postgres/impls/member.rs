//! [`Member`]-related [`Database`] implementations.

use common::operations::{By, Insert, Lock, Select};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{member, Member},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Builds a [`Member`] out of the provided [`Row`].
fn member_from_row(row: &Row) -> Member {
    Member {
        id: row.get("id"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Member>, member::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Member>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Member>, member::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT id, email, first_name, last_name, created_at \
            FROM members \
            WHERE id = $1::INT8";
        Ok(self
            .query_opt(SQL, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(member_from_row))
    }
}

impl<C> Database<Select<By<Option<Member>, &member::Email>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Member>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Member>, &member::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT id, email, first_name, last_name, created_at \
            FROM members \
            WHERE email = $1::VARCHAR";
        Ok(self
            .query_opt(SQL, &[by.into_inner()])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(member_from_row))
    }
}

impl<C> Database<Select<By<Option<member::PasswordHash>, member::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<member::PasswordHash>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<member::PasswordHash>, member::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT hash \
            FROM member_password_hashes \
            WHERE member_id = $1::INT8";
        Ok(self
            .query_opt(SQL, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| row.get("hash")))
    }
}

impl<C> Database<Lock<By<Member, member::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    /// Locks the [`Member`] row until the end of the current transaction.
    ///
    /// Does nothing if the [`Member`] doesn't exist.
    async fn execute(
        &self,
        Lock(by): Lock<By<Member, member::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT id \
            FROM members \
            WHERE id = $1::INT8 \
            FOR UPDATE";
        _ = self
            .query_opt(SQL, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())?;
        Ok(())
    }
}

impl<C> Database<Insert<member::Draft>> for Postgres<C>
where
    C: Connection,
{
    type Ok = member::Id;
    type Err = Traced<database::Error>;

    /// Inserts the [`Member`] along with its password hash.
    ///
    /// Should be run in a transaction, as consists of two statements.
    async fn execute(
        &self,
        Insert(draft): Insert<member::Draft>,
    ) -> Result<Self::Ok, Self::Err> {
        const INSERT_MEMBER: &str = "\
            INSERT INTO members (email, first_name, last_name, created_at) \
            VALUES ($1::VARCHAR, $2::VARCHAR, $3::VARCHAR, $4::TIMESTAMPTZ) \
            RETURNING id";
        let id: member::Id = self
            .query(
                INSERT_MEMBER,
                &[
                    &draft.email,
                    &draft.first_name,
                    &draft.last_name,
                    &draft.created_at,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?
            .first()
            .map(|row| row.get("id"))
            .ok_or_else(|| {
                tracerr::new!(database::Error::from(
                    database::postgres::Error::NoRowsReturned,
                ))
            })?;

        const INSERT_HASH: &str = "\
            INSERT INTO member_password_hashes (member_id, hash) \
            VALUES ($1::INT8, $2::VARCHAR)";
        _ = self
            .exec(INSERT_HASH, &[&id, &draft.password_hash])
            .await
            .map_err(tracerr::wrap!())?;

        Ok(id)
    }
}
