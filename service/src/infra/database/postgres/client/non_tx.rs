//! [`NonTx`] client definitions.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio_postgres::{Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{
        self,
        connection::{self, Params},
        Connection,
    },
};

/// Non-transactional Postgres database client.
///
/// Acquires a pooled connection on first use and keeps it for the rest of its
/// lifetime (shared between clones).
#[derive(Clone, Debug)]
pub struct NonTx {
    /// [`connection::Pool`] to acquire connections from.
    pub(crate) pool: connection::Pool,

    /// Lazily acquired connection.
    connection: Arc<OnceCell<connection::NonTx>>,
}

impl NonTx {
    /// Creates a new [`NonTx`] client over the provided [`connection::Pool`].
    #[must_use]
    pub(crate) fn from_pool(pool: connection::Pool) -> Self {
        Self {
            pool,
            connection: Arc::new(OnceCell::new()),
        }
    }

    /// Acquires a fresh [`connection::NonTx`] from the [`connection::Pool`].
    pub(crate) async fn acquire(
        &self,
    ) -> Result<connection::NonTx, Traced<database::Error>> {
        self.pool
            .get()
            .await
            .map_err(tracerr::from_and_wrap!(=> postgres::Error))
            .map_err(tracerr::map_from)
    }

    /// Returns the [`connection::NonTx`] of this client, acquiring it if
    /// needed.
    async fn connection(
        &self,
    ) -> Result<&connection::NonTx, Traced<database::Error>> {
        self.connection
            .get_or_try_init(|| self.acquire())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl Connection for NonTx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &Params<'_>,
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.connection()
            .await?
            .query(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &Params<'_>,
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.connection()
            .await?
            .query_opt(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &Params<'_>,
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        self.connection()
            .await?
            .exec(stmt, params)
            .await
            .map_err(tracerr::wrap!())
    }
}
