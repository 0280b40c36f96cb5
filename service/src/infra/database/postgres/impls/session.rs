//! [`Session`]-related [`Database`] implementations.

use common::operations::{By, Delete, Insert, Select, Update};
use tracerr::Traced;

use crate::{
    domain::member::{self, session, Session},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Session>, &session::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, &session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT id, member_id, expires_at \
            FROM member_sessions \
            WHERE id = $1::VARCHAR";
        Ok(self
            .query_opt(SQL, &[by.into_inner()])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Session {
                id: row.get("id"),
                member_id: row.get("member_id"),
                expires_at: row.get("expires_at"),
            }))
    }
}

impl<C> Database<Insert<Session>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(session): Insert<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO member_sessions (id, member_id, expires_at) \
            VALUES ($1::VARCHAR, $2::INT8, $3::TIMESTAMPTZ)";
        _ = self
            .exec(
                SQL,
                &[&session.id, &session.member_id, &session.expires_at],
            )
            .await
            .map_err(tracerr::wrap!())?;
        Ok(())
    }
}

impl<C> Database<Update<Session>> for Postgres<C>
where
    C: Connection,
{
    /// Whether the [`Session`] still existed.
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(session): Update<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE member_sessions \
            SET expires_at = $2::TIMESTAMPTZ \
            WHERE id = $1::VARCHAR";
        Ok(self
            .exec(SQL, &[&session.id, &session.expires_at])
            .await
            .map_err(tracerr::wrap!())?
            > 0)
    }
}

impl<C> Database<Delete<By<Session, member::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, member::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            DELETE FROM member_sessions \
            WHERE member_id = $1::INT8";
        _ = self
            .exec(SQL, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())?;
        Ok(())
    }
}

impl<C> Database<Delete<By<Session, session::ExpirationDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    /// Number of deleted [`Session`]s.
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, session::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            DELETE FROM member_sessions \
            WHERE expires_at <= $1::TIMESTAMPTZ";
        self.exec(SQL, &[&by.into_inner()])
            .await
            .map_err(tracerr::wrap!())
    }
}
