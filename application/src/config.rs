//! [`Config`]-related definitions.

use std::time;

use common::datetime::SignedDuration;
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Service configuration.
    pub service: Service,

    /// Session cookie configuration.
    pub cookie: Cookie,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    ///
    /// Wildcard is not allowed, as the session cookie is sent with requests.
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Member sessions configuration.
    pub session: Session,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl Service {
    /// Longest allowed session `lifetime` or `refresh_buffer` (100 years).
    pub const MAX_SESSION_SPAN: time::Duration =
        time::Duration::from_secs(100 * 365 * 24 * 60 * 60);
}

impl TryFrom<Service> for service::Config {
    type Error = ConfigError;

    fn try_from(value: Service) -> Result<Self, Self::Error> {
        let Service {
            session:
                Session {
                    lifetime,
                    refresh_buffer,
                },
            tasks: Tasks {
                clean_expired_sessions,
            },
        } = value;

        let span = |name: &str, value: time::Duration| {
            if value > Service::MAX_SESSION_SPAN {
                return Err(ConfigError::Message(format!(
                    "`service.session.{name}` must not exceed 100 years",
                )));
            }
            SignedDuration::try_from(value).map_err(|e| {
                ConfigError::Message(format!(
                    "`service.session.{name}` is out of range: {e}",
                ))
            })
        };
        if lifetime.is_zero() {
            return Err(ConfigError::Message(
                "`service.session.lifetime` must be non-zero".to_owned(),
            ));
        }
        _ = span("lifetime", lifetime)?;
        let refresh_buffer = span("refresh_buffer", refresh_buffer)?;
        if clean_expired_sessions.interval.is_zero() {
            return Err(ConfigError::Message(
                "`service.tasks.clean_expired_sessions.interval` must be \
                 non-zero"
                    .to_owned(),
            ));
        }

        Ok(Self {
            session_lifetime: lifetime,
            session_refresh_buffer: refresh_buffer,
            clean_expired_sessions:
                service::task::clean_expired_sessions::Config {
                    interval: clean_expired_sessions.interval,
                },
        })
    }
}

/// Member sessions configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Session {
    /// Lifetime of a new or extended session.
    #[default(time::Duration::from_secs(60 * 60 * 24))]
    #[serde(with = "humantime_serde")]
    pub lifetime: time::Duration,

    /// Window before a session expiration, during which the session is
    /// extended on use.
    #[default(time::Duration::from_secs(60 * 60))]
    #[serde(with = "humantime_serde")]
    pub refresh_buffer: time::Duration,
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Tasks {
    /// `CleanExpiredSessions` task configuration.
    pub clean_expired_sessions: Task,
}

/// Service task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Task {
    /// Task execution interval.
    #[default(time::Duration::from_secs(60 * 60))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,
}

/// Session cookie configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cookie {
    /// Name of the cookie carrying a session token.
    #[default("session_token".to_owned())]
    pub name: String,

    /// Whether the cookie is sent over HTTPS only.
    #[default(true)]
    pub secure: bool,
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database name to connect to.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::datetime::SignedDuration;

    use super::{Service, Session, Task, Tasks};

    fn section(
        lifetime: Duration,
        refresh_buffer: Duration,
        interval: Duration,
    ) -> Service {
        Service {
            session: Session {
                lifetime,
                refresh_buffer,
            },
            tasks: Tasks {
                clean_expired_sessions: Task { interval },
            },
        }
    }

    #[test]
    fn converts_defaults() {
        let config = service::Config::try_from(Service::default()).unwrap();

        assert_eq!(config.session_lifetime, Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.session_refresh_buffer, SignedDuration::hours(1));
        assert_eq!(
            config.clean_expired_sessions.interval,
            Duration::from_secs(60 * 60),
        );
    }

    #[test]
    fn rejects_oversized_session_spans() {
        let hour = Duration::from_secs(60 * 60);
        let huge = Duration::from_secs(20_000 * 365 * 24 * 60 * 60);

        for (lifetime, buffer, name) in [
            (hour, huge, "refresh_buffer"),
            (hour, Duration::MAX, "refresh_buffer"),
            (huge, hour, "lifetime"),
        ] {
            let err = service::Config::try_from(section(lifetime, buffer, hour))
                .unwrap_err();
            assert!(err.to_string().contains(name), "{err}");
        }

        let max = Service::MAX_SESSION_SPAN;
        let config =
            service::Config::try_from(section(max, max, hour)).unwrap();
        assert_eq!(config.session_lifetime, max);
    }

    #[test]
    fn rejects_zero_durations() {
        let hour = Duration::from_secs(60 * 60);

        let err =
            service::Config::try_from(section(Duration::ZERO, hour, hour))
                .unwrap_err();
        assert!(err.to_string().contains("lifetime"), "{err}");

        let err =
            service::Config::try_from(section(hour, hour, Duration::ZERO))
                .unwrap_err();
        assert!(err.to_string().contains("interval"), "{err}");

        _ = service::Config::try_from(section(hour, Duration::ZERO, hour))
            .unwrap();
    }
}
