//! [`Context`]-related definitions.

use std::{
    future,
    sync::{
        atomic::{self, AtomicU16},
        Mutex, PoisonError,
    },
};

use axum::{async_trait, extract::FromRequestParts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use common::DateTime;
use juniper::{
    http::{GraphQLBatchResponse, GraphQLResponse},
    IntoFieldError as _,
};
use service::{
    command::{self, Command as _},
    domain::member::session,
};
use tokio::sync::OnceCell;

#[cfg(doc)]
use crate::api::Member;
use crate::{api, config, define_error, AsError, Error, JuniperResponse, Service};

/// Application context.
#[derive(Debug)]
pub struct Context {
    /// [`Service`] instance.
    service: Service,

    /// Session cookie configuration.
    cookie: config::Cookie,

    /// Error status code.
    error_status_code: AtomicU16,

    /// [`session::Token`] provided with the HTTP request, if any.
    token: Option<session::Token>,

    /// Current [`Session`].
    current_session: OnceCell<Session>,

    /// Last authentication [`Error`].
    auth_error: OnceCell<Error>,

    /// Session cookie to be set by the HTTP response, if any.
    pending_cookie: Mutex<Option<Cookie<'static>>>,
}

impl Context {
    /// Returns [`Service`] instance of this [`Context`].
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Returns the [`session::Token`] provided with the HTTP request, if any.
    #[must_use]
    pub fn token(&self) -> Option<&session::Token> {
        self.token.as_ref()
    }

    /// Returns the error status code of this [`Context`].
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn error_status_code(&self) -> http::StatusCode {
        http::StatusCode::from_u16(
            self.error_status_code.load(atomic::Ordering::Relaxed),
        )
        .expect("invalid status code")
    }

    /// Sets the error status code for this [`Context`].
    ///
    /// Provided [`http::StatusCode`] will be applied to the response.
    pub fn set_error_status_code(&self, status_code: http::StatusCode) {
        self.error_status_code
            .store(status_code.as_u16(), atomic::Ordering::Relaxed);
    }

    /// Helper method calling [`Context::set_error_status_code()`] inside
    /// [`Result::map_err()`] closure.
    pub fn error(&self) -> impl FnOnce(Error) -> Error + '_ {
        move |err| {
            self.set_error_status_code(err.status_code);
            err
        }
    }

    /// Sets the current [`Session`] for this [`Context`], and makes the HTTP
    /// response deliver its token to the client.
    pub async fn set_current_session(&self, session: Session) {
        self.set_session_cookie(&session.token, session.expires_at);
        _ = self
            .current_session
            .get_or_init(|| future::ready(session))
            .await;
    }

    /// Makes the HTTP response remove the session cookie from the client.
    pub fn remove_session_cookie(&self) {
        let cookie = Cookie::build((self.cookie.name.clone(), ""))
            .http_only(true)
            .secure(self.cookie.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .expires(time::OffsetDateTime::UNIX_EPOCH)
            .max_age(time::Duration::ZERO)
            .build();
        self.replace_pending_cookie(cookie);
    }

    /// Returns the [`CookieJar`] with the cookies to be set by the HTTP
    /// response.
    #[must_use]
    pub fn cookies(&self) -> CookieJar {
        let jar = CookieJar::new();
        match self
            .pending_cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(cookie) => jar.add(cookie),
            None => jar,
        }
    }

    /// Tries to get the current [`Session`] for this [`Context`].
    ///
    /// # Errors
    ///
    /// Errors if the provided session token is invalid.
    pub async fn try_current_session(&self) -> Result<Option<Session>, Error> {
        self.current_session().await.map(Some).or_else(|e| {
            if e.is(AuthError::AuthorizationRequired) {
                Ok(None)
            } else {
                Err(e)
            }
        })
    }

    /// Returns the current [`Session`] for this [`Context`].
    ///
    /// # Errors
    ///
    /// Errors if:
    /// - the current HTTP request carries no session token;
    /// - the provided session token is invalid or expired.
    pub async fn current_session(&self) -> Result<Session, Error> {
        self.current_session
            .get_or_try_init(|| async {
                match self
                    .auth_error
                    .get_or_try_init(|| async {
                        match self.do_authentication().await {
                            Ok(s) => Err(s),
                            Err(e) => Ok(e),
                        }
                    })
                    .await
                {
                    Ok(e) => Err(e),
                    Err(s) => Ok(s),
                }
            })
            .await
            .cloned()
            .map_err(Clone::clone)
    }

    /// Performs the [`Session`] authentication.
    ///
    /// # Errors
    ///
    /// Errors if the provided session token is absent, invalid or expired.
    async fn do_authentication(&self) -> Result<Session, Error> {
        let Some(token) = self.token.clone() else {
            return Err(self.error()(AuthError::AuthorizationRequired.into()));
        };

        match self
            .service
            .execute(command::ValidateMemberSession {
                token: token.clone(),
            })
            .await
        {
            Ok(command::validate_member_session::Output {
                session,
                refreshed,
            }) => {
                let expires_at = session.expires_at.coerce();
                if refreshed {
                    self.set_session_cookie(&token, expires_at);
                }
                Ok(Session {
                    member_id: session.member_id.into(),
                    token,
                    expires_at,
                })
            }
            Err(e) => {
                use command::validate_member_session::ExecutionError as E;

                if matches!(e.as_ref(), E::NoSession | E::InvalidSession) {
                    self.remove_session_cookie();
                }
                Err(self.error()(e.into_error()))
            }
        }
    }

    /// Makes the HTTP response set the session cookie with the provided
    /// [`session::Token`], expiring along with the session.
    fn set_session_cookie(&self, token: &session::Token, expires_at: DateTime) {
        let value: &str = token.as_ref();
        let cookie = Cookie::build((self.cookie.name.clone(), value.to_owned()))
            .http_only(true)
            .secure(self.cookie.secure)
            .same_site(SameSite::Strict)
            .path("/")
            .expires(time::OffsetDateTime::from(expires_at))
            .build();
        self.replace_pending_cookie(cookie);
    }

    /// Replaces the cookie to be set by the HTTP response.
    fn replace_pending_cookie(&self, cookie: Cookie<'static>) {
        *self
            .pending_cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(cookie);
    }
}

impl juniper::Context for Context {}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = JuniperResponse;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let missing = |what: &str| JuniperResponse {
            status_code: http::StatusCode::INTERNAL_SERVER_ERROR,
            response: GraphQLBatchResponse::Single(GraphQLResponse::error(
                Error::internal(&format!("missing `{what}` extension"))
                    .into_field_error(),
            )),
        };
        let service = parts
            .extensions
            .get::<Service>()
            .cloned()
            .ok_or_else(|| missing("Service"))?;
        let cookie = parts
            .extensions
            .get::<config::Cookie>()
            .cloned()
            .ok_or_else(|| missing("config::Cookie"))?;

        let token = CookieJar::from_headers(&parts.headers)
            .get(&cookie.name)
            .map(|c| {
                c.value()
                    .parse::<session::Token>()
                    .unwrap_or_else(|e| match e {})
            });

        Ok(Self {
            service,
            cookie,
            error_status_code: AtomicU16::new(
                http::StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            ),
            token,
            current_session: OnceCell::new(),
            auth_error: OnceCell::new(),
            pending_cookie: Mutex::new(None),
        })
    }
}

/// Authenticated session of a [`Member`].
#[derive(Clone, Debug)]
pub struct Session {
    /// ID of the [`Member`] associated with this [`Session`].
    pub member_id: api::member::Id,

    /// Session token.
    pub token: session::Token,

    /// [`DateTime`] when this [`Session`] expires.
    pub expires_at: DateTime,
}

impl AsError for command::validate_member_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::NoSession => Some(AuthError::AuthorizationRequired.into()),
            Self::InvalidSession => Some(AuthError::SessionExpired.into()),
        }
    }
}

define_error! {
    enum AuthError {
        #[code = "AUTHORIZATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authorization required"]
        AuthorizationRequired,

        #[code = "SESSION_EXPIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Session has expired"]
        SessionExpired,
    }
}
