//! In-memory [`Database`] implementation.
//!
//! Transactions are serialized: a [`Tx`] holds the whole [`State`] locked from
//! its first operation until it's committed or dropped, and works on a copy
//! of it, so uncommitted changes are never observed by anyone else.

use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    sync::Arc,
};

use common::operations::{
    By, Commit, Delete, Insert, Lock, Select, Transact, Update,
};
use derive_more::{Display, Error as StdError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{
        member::{self, session, Session},
        permission, role, Member, Permission, Role,
    },
    infra::{database, Database},
};

/// Name of the primary key constraint of [`Session`]s.
const SESSION_ID_CONSTRAINT: &str = "member_sessions_pkey";

/// In-memory [`Database`] client.
#[derive(Clone, Debug, Default)]
pub struct Memory<T = NonTx>(T);

impl Memory {
    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the provided [`Role`] granting the provided [`Permission`]s.
    pub async fn add_role(&self, role: Role, permissions: Vec<Permission>) {
        let mut state = self.0.state.lock().await;
        let ids = permissions
            .into_iter()
            .map(|p| {
                let id = p.id;
                _ = state.permissions.insert(id, p);
                id
            })
            .collect();
        _ = state.role_permissions.insert(role.id, ids);
        _ = state.roles.insert(role.id, role);
    }

    /// Assigns the [`Role`] with the provided ID to the [`Member`].
    pub async fn assign_role(&self, member_id: member::Id, role_id: role::Id) {
        self.0
            .state
            .lock()
            .await
            .member_roles
            .entry(member_id)
            .or_default()
            .push(role_id);
    }

    /// Returns all the stored [`Session`]s.
    pub async fn sessions(&self) -> Vec<Session> {
        self.0.state.lock().await.sessions.values().cloned().collect()
    }

    /// Returns the number of stored [`Member`]s.
    pub async fn members_count(&self) -> usize {
        self.0.state.lock().await.members.len()
    }
}

/// Stored data of a [`Memory`] database.
#[derive(Clone, Debug, Default)]
pub struct State {
    /// Stored [`Member`]s along with their [`member::PasswordHash`]es.
    members: BTreeMap<member::Id, (Member, member::PasswordHash)>,

    /// Last assigned [`member::Id`].
    last_member_id: i64,

    /// Stored [`Session`]s.
    sessions: HashMap<session::Id, Session>,

    /// Stored [`Role`]s.
    roles: BTreeMap<role::Id, Role>,

    /// [`Role`]s assigned to [`Member`]s, in the assignment order.
    member_roles: HashMap<member::Id, Vec<role::Id>>,

    /// Stored [`Permission`]s.
    permissions: BTreeMap<permission::Id, Permission>,

    /// [`Permission`]s granted by [`Role`]s, in the grant order.
    role_permissions: HashMap<role::Id, Vec<permission::Id>>,
}

/// Non-transactional [`Memory`] client.
#[derive(Clone, Debug, Default)]
pub struct NonTx {
    /// Shared [`State`] of the database.
    state: Arc<Mutex<State>>,
}

/// Transactional [`Memory`] client.
#[derive(Clone, Debug)]
pub struct Tx {
    /// Shared [`State`] of the database.
    state: Arc<Mutex<State>>,

    /// [`Stage`] of this transaction.
    stage: Arc<Mutex<Stage>>,
}

/// Stage of a [`Tx`].
#[derive(Debug)]
enum Stage {
    /// No operations were performed yet.
    Pending,

    /// [`State`] is locked and changes are accumulated in its copy.
    Open {
        /// Guard of the locked [`State`].
        guard: OwnedMutexGuard<State>,

        /// Working copy of the locked [`State`].
        working: State,
    },

    /// Transaction is committed.
    Committed,
}

/// Generic [`Memory`] connection.
pub trait Connection {
    /// Applies the provided function to the [`State`] visible to this
    /// [`Connection`].
    ///
    /// # Errors
    ///
    /// If this [`Connection`] cannot be used anymore.
    fn with_state<R, F>(
        &self,
        f: F,
    ) -> impl Future<Output = Result<R, Traced<database::Error>>>
    where
        F: FnOnce(&mut State) -> R;
}

impl Connection for NonTx {
    async fn with_state<R, F>(&self, f: F) -> Result<R, Traced<database::Error>>
    where
        F: FnOnce(&mut State) -> R,
    {
        Ok(f(&mut *self.state.lock().await))
    }
}

impl Connection for Tx {
    async fn with_state<R, F>(&self, f: F) -> Result<R, Traced<database::Error>>
    where
        F: FnOnce(&mut State) -> R,
    {
        let mut stage = self.stage.lock().await;
        if matches!(*stage, Stage::Pending) {
            let guard = Arc::clone(&self.state).lock_owned().await;
            let working = guard.clone();
            *stage = Stage::Open { guard, working };
        }
        match &mut *stage {
            Stage::Open { working, .. } => Ok(f(working)),
            Stage::Pending | Stage::Committed => {
                Err(tracerr::new!(database::Error::from(Error::TxFinished)))
            }
        }
    }
}

impl Tx {
    /// Applies all the changes of this [`Tx`] to the shared [`State`].
    async fn commit(&self) -> Result<(), Traced<database::Error>> {
        let mut stage = self.stage.lock().await;
        match std::mem::replace(&mut *stage, Stage::Committed) {
            Stage::Open { mut guard, working } => {
                *guard = working;
                Ok(())
            }
            // No operations, so nothing to apply.
            Stage::Pending => Ok(()),
            Stage::Committed => {
                Err(tracerr::new!(database::Error::from(Error::TxFinished)))
            }
        }
    }
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// Transaction has been committed already.
    #[display("Transaction is already committed")]
    TxFinished,

    /// Unique constraint is violated.
    #[display("Unique constraint `{_0}` is violated")]
    UniqueViolation(#[error(not(source))] &'static str),
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |x| x == *c),
            Self::TxFinished => false,
        }
    }
}

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(Memory(Tx {
            state: Arc::clone(&self.0.state),
            stage: Arc::new(Mutex::new(Stage::Pending)),
        }))
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.0.commit().await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Option<Member>, member::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = Option<Member>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Member>, member::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .with_state(|s| s.members.get(&id).map(|(m, _)| m.clone()))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<'l, C> Database<Select<By<Option<Member>, &'l member::Email>>> for Memory<C>
where
    C: Connection,
{
    type Ok = Option<Member>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Member>, &'l member::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        self.0
            .with_state(|s| {
                s.members
                    .values()
                    .find(|(m, _)| &m.email == email)
                    .map(|(m, _)| m.clone())
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Option<member::PasswordHash>, member::Id>>>
    for Memory<C>
where
    C: Connection,
{
    type Ok = Option<member::PasswordHash>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<member::PasswordHash>, member::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .with_state(|s| s.members.get(&id).map(|(_, h)| h.clone()))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Lock<By<Member, member::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    /// Opens the [`Tx`], if any, which locks the whole [`State`] already.
    async fn execute(
        &self,
        _: Lock<By<Member, member::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0.with_state(|s| drop(s)).await.map_err(tracerr::wrap!())
    }
}

impl<C> Database<Insert<member::Draft>> for Memory<C>
where
    C: Connection,
{
    type Ok = member::Id;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(draft): Insert<member::Draft>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with_state(|s| {
                if s.members.values().any(|(m, _)| m.email == draft.email) {
                    return Err(Error::UniqueViolation(
                        database::MEMBER_EMAIL_CONSTRAINT,
                    ));
                }

                s.last_member_id += 1;
                let id = member::Id::from(s.last_member_id);
                let hash = draft.password_hash.clone();
                _ = s.members.insert(id, (draft.into_member(id), hash));
                Ok(id)
            })
            .await
            .map_err(tracerr::wrap!())?
            .map_err(tracerr::from_and_wrap!(=> database::Error))
    }
}

impl<'l, C> Database<Select<By<Option<Session>, &'l session::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, &'l session::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.0
            .with_state(|s| s.sessions.get(id).cloned())
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Insert<Session>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(session): Insert<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with_state(|s| {
                if s.sessions.contains_key(&session.id) {
                    return Err(Error::UniqueViolation(SESSION_ID_CONSTRAINT));
                }
                _ = s.sessions.insert(session.id.clone(), session);
                Ok(())
            })
            .await
            .map_err(tracerr::wrap!())?
            .map_err(tracerr::from_and_wrap!(=> database::Error))
    }
}

impl<C> Database<Update<Session>> for Memory<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(session): Update<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        self.0
            .with_state(|s| {
                s.sessions
                    .get_mut(&session.id)
                    .map(|stored| stored.expires_at = session.expires_at)
                    .is_some()
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Delete<By<Session, member::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, member::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let member_id = by.into_inner();
        self.0
            .with_state(|s| s.sessions.retain(|_, v| v.member_id != member_id))
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Delete<By<Session, session::ExpirationDateTime>>> for Memory<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, session::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();
        self.0
            .with_state(|s| {
                let before = s.sessions.len();
                s.sessions.retain(|_, v| v.expires_at > deadline);
                u64::try_from(before - s.sessions.len()).unwrap_or(u64::MAX)
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Vec<Role>, member::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = Vec<Role>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Role>, member::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let member_id = by.into_inner();
        self.0
            .with_state(|s| {
                s.member_roles
                    .get(&member_id)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| s.roles.get(id).cloned())
                    .collect()
            })
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<permission::Collection, role::Id>>> for Memory<C>
where
    C: Connection,
{
    type Ok = permission::Collection;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<permission::Collection, role::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let role_id = by.into_inner();
        self.0
            .with_state(|s| {
                s.role_permissions
                    .get(&role_id)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| s.permissions.get(id).cloned())
                    .collect()
            })
            .await
            .map_err(tracerr::wrap!())
    }
}
