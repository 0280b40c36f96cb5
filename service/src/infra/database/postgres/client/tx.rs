//! [`Tx`] client definitions.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::{Row, ToStatement};
use tracerr::Traced;

use crate::infra::database::{
    self,
    postgres::{
        connection::{self, Params},
        Connection,
    },
};

use super::NonTx;

/// Transactional Postgres database client.
///
/// Begins the transaction on first use, so a [`Tx`] which is never used
/// doesn't occupy a pooled connection. Dropping a [`Tx`] without committing it
/// rolls the transaction back.
#[derive(Clone, Debug)]
pub struct Tx {
    /// [`NonTx`] client to acquire the transaction connection with.
    client: NonTx,

    /// Lazily begun transaction.
    ///
    /// [`None`] until first used, and after being committed.
    tx: Arc<Mutex<Option<connection::Tx>>>,
}

impl Tx {
    /// Creates a new [`Tx`] client from the provided [`NonTx`] client.
    #[must_use]
    pub fn from_non_tx(client: NonTx) -> Self {
        Self {
            client,
            tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the open [`connection::Tx`], beginning it if needed.
    async fn connection(
        &self,
    ) -> Result<MutexGuard<'_, Option<connection::Tx>>, Traced<database::Error>>
    {
        let mut tx = self.tx.lock().await;
        if tx.is_none() {
            let conn = self.client.acquire().await.map_err(tracerr::wrap!())?;
            *tx = Some(
                connection::Tx::begin(conn)
                    .await
                    .map_err(tracerr::wrap!())?,
            );
        }
        Ok(tx)
    }

    /// Commits the transaction of this [`Tx`] client, if it was begun.
    ///
    /// # Errors
    ///
    /// If failed to commit the transaction.
    pub async fn commit(&self) -> Result<(), Traced<database::Error>> {
        let tx = self.tx.lock().await.take();
        if let Some(tx) = tx {
            tx.commit().await.map_err(tracerr::wrap!())?;
        }
        Ok(())
    }
}

/// Runs the provided [`Connection`] method on the open transaction.
macro_rules! on_tx {
    ($this:ident.$method:ident($stmt:ident, $params:ident)) => {{
        let guard = $this.connection().await?;
        let tx = guard.as_ref().expect("begun by `Tx::connection()`");
        tx.$method($stmt, $params).await.map_err(tracerr::wrap!())
    }};
}

impl Connection for Tx {
    async fn query<T>(
        &self,
        stmt: &T,
        params: &Params<'_>,
    ) -> Result<Vec<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        on_tx!(self.query(stmt, params))
    }

    async fn query_opt<T>(
        &self,
        stmt: &T,
        params: &Params<'_>,
    ) -> Result<Option<Row>, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        on_tx!(self.query_opt(stmt, params))
    }

    async fn exec<T>(
        &self,
        stmt: &T,
        params: &Params<'_>,
    ) -> Result<u64, Traced<database::Error>>
    where
        T: ToStatement + ?Sized,
    {
        on_tx!(self.exec(stmt, params))
    }
}
