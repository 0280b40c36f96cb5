//! GraphQL [`Query`]s definitions.

use juniper::graphql_object;
use service::{command, query, Command as _, Query as _};

use crate::{api, define_error, AsError, Context, Error};

/// Root of all GraphQL queries.
#[derive(Clone, Copy, Debug)]
pub struct Query;

impl Query {
    /// Name of the [`tracing::Span`] for the queries.
    pub(crate) const SPAN_NAME: &'static str = "GraphQL query";
}

#[graphql_object(context = Context)]
impl Query {
    /// Returns the currently authenticated `Member`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - no valid session is provided;
    /// - `SESSION_EXPIRED` - the provided session has expired.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "myMember",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn my_member(ctx: &Context) -> Result<api::Member, Error> {
        let my_id = ctx.current_session().await?.member_id;
        ctx.service()
            .execute(query::member::ById::by(my_id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| MemberError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Returns all the `Permission`s of the currently authenticated `Member`,
    /// granted by its roles.
    ///
    /// The same `Permission` is listed once per role granting it.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - no valid session is provided;
    /// - `SESSION_EXPIRED` - the provided session has expired.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "myPermissions",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn my_permissions(
        ctx: &Context,
    ) -> Result<Vec<api::Permission>, Error> {
        let my_id = ctx.current_session().await?.member_id;
        ctx.service()
            .execute(query::member::Permissions {
                member_id: my_id.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(|permissions| {
                permissions.into_iter().map(Into::into).collect()
            })
    }

    /// Checks whether the currently authenticated `Member` holds all the
    /// provided `Permission`s.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - no valid session is provided;
    /// - `SESSION_EXPIRED` - the provided session has expired.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "isAuthorized",
            otel.name = Self::SPAN_NAME,
            permissions = ?permissions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        ),
    )]
    pub async fn is_authorized(
        permissions: Vec<api::member::PermissionName>,
        ctx: &Context,
    ) -> Result<bool, Error> {
        use command::authorize_member::ExecutionError as E;

        let my_id = ctx.current_session().await?.member_id;
        match ctx
            .service()
            .execute(command::AuthorizeMember {
                member_id: my_id.into(),
                required: permissions.into_iter().map(Into::into).collect(),
            })
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if matches!(e.as_ref(), E::MissingPermissions(_)) => {
                Ok(false)
            }
            Err(e) => Err(ctx.error()(e.into_error())),
        }
    }
}

impl AsError for command::authorize_member::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "MISSING_PERMISSIONS"]
                #[status = FORBIDDEN]
                #[message = "Authenticated `Member` lacks required permissions"]
                MissingPermissions,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::MissingPermissions(_) => {
                Some(Error::MissingPermissions.into())
            }
        }
    }
}

define_error! {
    enum MemberError {
        #[code = "MEMBER_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`Member` does not exist"]
        NotExists,
    }
}
