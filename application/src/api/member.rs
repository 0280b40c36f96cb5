//! [`Member`]-related definitions.

use common::DateTime;
use derive_more::{AsRef, Display, From, Into};
use futures::{future, TryFutureExt as _};
use juniper::{
    graphql_object, GraphQLObject, GraphQLScalar, InputValue, ScalarValue,
    Value,
};
use service::{domain, query, Query as _};
use tokio::sync::OnceCell;

use crate::{
    api::{self, scalar},
    AsError, Context, Error,
};

/// A [`Member`] of the platform.
#[derive(Clone, Debug)]
pub struct Member {
    /// ID of this [`Member`].
    pub id: Id,

    /// [`domain::Member`] representing this [`Member`].
    member: OnceCell<domain::Member>,
}

impl From<domain::Member> for Member {
    fn from(member: domain::Member) -> Self {
        Self {
            id: member.id.into(),
            member: OnceCell::new_with(Some(member)),
        }
    }
}

impl Member {
    /// Returns the [`domain::Member`] representing this [`Member`].
    ///
    /// # Errors
    ///
    /// Error if the [`domain::Member`] doesn't exist.
    async fn member(&self, ctx: &Context) -> Result<&domain::Member, Error> {
        let id = self.id.into();
        self.member
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::member::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|m| {
                        future::ready(m.ok_or_else(|| {
                            api::query::MemberError::NotExists.into()
                        }))
                    })
            })
            .await
    }
}

/// A `Member` of the platform.
#[graphql_object(context = Context)]
impl Member {
    /// Unique identifier of this `Member`.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Email of this `Member`, used to log in.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Member.email",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn email(&self, ctx: &Context) -> Result<Email, Error> {
        Ok(self.member(ctx).await?.email.clone().into())
    }

    /// First name of this `Member`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Member.firstName",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn first_name(&self, ctx: &Context) -> Result<Name, Error> {
        Ok(self.member(ctx).await?.first_name.clone().into())
    }

    /// Last name of this `Member`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Member.lastName",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn last_name(&self, ctx: &Context) -> Result<Name, Error> {
        Ok(self.member(ctx).await?.last_name.clone().into())
    }

    /// `DateTime` when this `Member` registered.
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.member(ctx).await?.created_at.coerce())
    }
}

/// Unique identifier of a `Member`.
#[derive(
    AsRef, Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[graphql(
    name = "MemberId",
    with = scalar::Via::<domain::member::Id>,
)]
pub struct Id(domain::member::Id);

/// First or last name of a `Member`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "MemberName",
    with = scalar::Via::<domain::member::Name>,
)]
pub struct Name(domain::member::Name);

/// Email of a `Member`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "MemberEmail",
    with = scalar::Via::<domain::member::Email>,
)]
pub struct Email(domain::member::Email);

/// Password of a `Member`.
///
/// Input only: never shown back.
#[derive(Clone, Debug, From, GraphQLScalar, Into)]
#[graphql(
    name = "MemberPassword",
    to_output_with = Self::to_output,
    from_input_with = Self::from_input,
    parse_token(String),
)]
pub struct Password(domain::member::Password);

impl Password {
    /// Masks this [`Password`] in a scalar [`Value`].
    fn to_output<S: ScalarValue>(_: &Self) -> Value<S> {
        Value::scalar("***".to_owned())
    }

    /// Parses a [`Password`] from the provided [`InputValue`].
    fn from_input<S: ScalarValue>(
        input: &InputValue<S>,
    ) -> Result<Self, String> {
        input
            .as_string_value()
            .ok_or_else(|| {
                format!(
                    "Cannot parse input scalar `MemberPassword`: expected \
                     string input value, found: {input}",
                )
            })?
            .parse()
            .map(Self)
            .map_err(|e| {
                format!("Cannot parse input scalar `MemberPassword`: {e}")
            })
    }
}

/// Name of a `Permission`, like `edit:event`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "PermissionName",
    with = scalar::Via::<domain::permission::Name>,
)]
pub struct PermissionName(domain::permission::Name);

/// Capability granted to a `Member` through one of its roles.
#[derive(Clone, Debug, GraphQLObject)]
#[graphql(context = Context)]
pub struct Permission {
    /// Unique name of this `Permission`.
    pub name: PermissionName,

    /// Human-readable name of this `Permission`.
    pub display_name: String,

    /// Description of this `Permission`.
    pub description: String,
}

impl From<domain::Permission> for Permission {
    fn from(permission: domain::Permission) -> Self {
        let domain::Permission {
            id: _,
            name,
            display_name,
            description,
        } = permission;
        Self {
            name: name.into(),
            display_name,
            description,
        }
    }
}

pub mod session {
    //! [`Session`]-related definitions.
    //!
    //! [`Session`]: crate::Session

    use common::DateTime;
    use juniper::GraphQLObject;
    use service::command;

    use crate::{api, Context};

    /// Result of a `Session` creation.
    ///
    /// The session token itself is delivered as a cookie.
    #[derive(Clone, Debug, GraphQLObject)]
    #[graphql(context = Context, name = "CreateSessionResult")]
    pub struct CreateResult {
        /// `Member` the created `Session` belongs to.
        pub member: api::Member,

        /// `DateTime` when the created `Session` expires.
        pub expires_at: DateTime,
    }

    impl From<command::create_member_session::Output> for CreateResult {
        fn from(output: command::create_member_session::Output) -> Self {
            let command::create_member_session::Output {
                token: _,
                member,
                expires_at,
            } = output;
            Self {
                member: member.into(),
                expires_at: expires_at.coerce(),
            }
        }
    }

    impl From<command::register_member::Output> for CreateResult {
        fn from(output: command::register_member::Output) -> Self {
            let command::register_member::Output {
                token: _,
                member,
                expires_at,
            } = output;
            Self {
                member: member.into(),
                expires_at: expires_at.coerce(),
            }
        }
    }
}
