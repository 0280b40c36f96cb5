//! GraphQL [`Mutation`]s definitions.

use juniper::graphql_object;
use service::{command, Command as _};

use crate::{api, define_error, AsError, Context, Error, Session};

/// Root of all GraphQL mutations.
#[derive(Clone, Copy, Debug)]
pub struct Mutation;

impl Mutation {
    /// Name of the [`tracing::Span`] for the mutations.
    const SPAN_NAME: &'static str = "GraphQL mutation";
}

#[graphql_object(context = Context)]
impl Mutation {
    /// Registers a new `Member` and starts a `Session` for it.
    ///
    /// The session token is set as a cookie.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `MEMBER_ALREADY_EXISTS` - provided `MemberEmail` is used by another
    ///                             `Member` already;
    /// - `PASSWORD_MISMATCH` - provided `passwordConfirmation` doesn't match
    ///                         the `password`.
    #[tracing::instrument(
        skip_all,
        fields(
            email = %email,
            first_name = %first_name,
            gql.name = "registerMember",
            last_name = %last_name,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn register_member(
        email: api::member::Email,
        password: api::member::Password,
        password_confirmation: api::member::Password,
        first_name: api::member::Name,
        last_name: api::member::Name,
        ctx: &Context,
    ) -> Result<api::member::session::CreateResult, Error> {
        let output = ctx
            .service()
            .execute(command::RegisterMember {
                email: email.into(),
                password: secrecy::SecretBox::init_with(move || {
                    password.into()
                }),
                password_confirmation: secrecy::SecretBox::init_with(
                    move || password_confirmation.into(),
                ),
                first_name: first_name.into(),
                last_name: last_name.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        ctx.set_current_session(Session {
            member_id: output.member.id.into(),
            token: output.token.clone(),
            expires_at: output.expires_at.coerce(),
        })
        .await;

        Ok(output.into())
    }

    /// Creates a new `Session` with the provided credentials, ending all the
    /// other `Session`s of the `Member`.
    ///
    /// The session token is set as a cookie.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `WRONG_CREDENTIALS` - provided credentials don't match any `Member`.
    #[tracing::instrument(
        skip_all,
        fields(
            email = %email,
            gql.name = "createMemberSession",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn create_member_session(
        email: api::member::Email,
        password: api::member::Password,
        ctx: &Context,
    ) -> Result<api::member::session::CreateResult, Error> {
        let output = ctx
            .service()
            .execute(command::CreateMemberSession {
                email: email.into(),
                password: secrecy::SecretBox::init_with(move || {
                    password.into()
                }),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?;

        ctx.set_current_session(Session {
            member_id: output.member.id.into(),
            token: output.token.clone(),
            expires_at: output.expires_at.coerce(),
        })
        .await;

        Ok(output.into())
    }

    /// Ends all the `Session`s of the currently authenticated `Member`, and
    /// removes the session cookie.
    ///
    /// Succeeds even if there is no valid `Session`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "deleteMemberSession",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn delete_member_session(ctx: &Context) -> Result<bool, Error> {
        if let Some(token) = ctx.token() {
            ctx.service()
                .execute(command::DeleteMemberSession {
                    token: token.clone(),
                })
                .await
                .map_err(AsError::into_error)
                .map_err(ctx.error())?;
        }
        ctx.remove_session_cookie();

        Ok(true)
    }
}

impl AsError for command::register_member::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "MEMBER_ALREADY_EXISTS"]
                #[status = CONFLICT]
                #[message = "`Member` with the provided email already exists"]
                AlreadyExists,

                #[code = "PASSWORD_MISMATCH"]
                #[status = BAD_REQUEST]
                #[message = "Provided password doesn't match its confirmation"]
                PasswordMismatch,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::AlreadyExists(_) => Some(Error::AlreadyExists.into()),
            Self::PasswordMismatch => Some(Error::PasswordMismatch.into()),
            Self::PasswordHash(_) | Self::TokenGeneration(_) => None,
        }
    }
}

impl AsError for command::create_member_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WRONG_CREDENTIALS"]
                #[status = FORBIDDEN]
                #[message = "Provided credentials don't match any `Member`"]
                WrongCredentials,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::TokenGeneration(_) => None,
            Self::NotFound(_) | Self::PasswordMismatch(_) => {
                Some(Error::WrongCredentials.into())
            }
        }
    }
}

impl AsError for command::delete_member_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
        }
    }
}

#[cfg(test)]
mod spec {
    use service::{command, domain::member};

    use crate::AsError as _;

    #[test]
    fn login_failures_are_indistinguishable() {
        use command::create_member_session::ExecutionError as E;

        let email = member::Email::new("jane@example.com").unwrap();
        let not_found = E::NotFound(email).try_as_error().unwrap();
        let mismatch = E::PasswordMismatch(member::Id::from(1))
            .try_as_error()
            .unwrap();

        assert_eq!(not_found.code, "WRONG_CREDENTIALS");
        assert_eq!(not_found.code, mismatch.code);
        assert_eq!(not_found.status_code, http::StatusCode::FORBIDDEN);
        assert_eq!(not_found.status_code, mismatch.status_code);
        assert_eq!(not_found.message, mismatch.message);
        assert_eq!(not_found.to_string(), mismatch.to_string());
    }

    #[test]
    fn registration_failures_are_distinguished() {
        use command::register_member::ExecutionError as E;

        let email = member::Email::new("jane@example.com").unwrap();
        let exists = E::AlreadyExists(email).try_as_error().unwrap();
        let mismatch = E::PasswordMismatch.try_as_error().unwrap();

        assert_eq!(exists.code, "MEMBER_ALREADY_EXISTS");
        assert_eq!(exists.status_code, http::StatusCode::CONFLICT);
        assert_eq!(mismatch.code, "PASSWORD_MISMATCH");
        assert_eq!(mismatch.status_code, http::StatusCode::BAD_REQUEST);
    }
}
