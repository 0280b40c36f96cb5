//! [`Session`] definitions.

use std::{convert::Infallible, fmt, str::FromStr};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use common::{datetime::SignedDuration, unit, DateTime, DateTimeOf};
use derive_more::{AsRef, Display};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use sha2::{Digest as _, Sha256};

#[cfg(doc)]
use crate::domain::Member;
use crate::domain::member;

/// Authenticated session of a [`Member`].
///
/// Never holds the [`Token`] it was created for, only its [`Id`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    /// ID of this [`Session`].
    pub id: Id,

    /// ID of the [`Member`] this [`Session`] belongs to.
    pub member_id: member::Id,

    /// [`DateTime`] when this [`Session`] expires.
    pub expires_at: ExpirationDateTime,
}

impl Session {
    /// Creates a new [`Session`] identified by the provided [`Token`].
    #[must_use]
    pub fn new(
        token: &Token,
        member_id: member::Id,
        expires_at: ExpirationDateTime,
    ) -> Self {
        Self {
            id: token.id(),
            member_id,
            expires_at,
        }
    }

    /// Checks whether this [`Session`] is expired at the provided moment.
    ///
    /// The expiration moment itself is considered expired already.
    #[must_use]
    pub fn is_expired(&self, now: DateTime) -> bool {
        now >= self.expires_at.coerce()
    }

    /// Checks whether this [`Session`] may be extended at the provided moment,
    /// i.e. it's not expired yet, but expires within the provided `buffer`.
    ///
    /// Negative `buffer` is treated as its absolute value. A `buffer` reaching
    /// past the earliest representable [`DateTime`] covers any moment.
    #[must_use]
    pub fn is_refreshable(&self, now: DateTime, buffer: SignedDuration) -> bool {
        !self.is_expired(now)
            && self
                .expires_at
                .checked_sub(buffer.abs())
                .map_or(true, |start| now >= start.coerce())
    }

    /// Returns the [`State`] of this [`Session`] at the provided moment.
    #[must_use]
    pub fn state(&self, now: DateTime, refresh_buffer: SignedDuration) -> State {
        if self.is_expired(now) {
            State::Expired
        } else if self.is_refreshable(now, refresh_buffer) {
            State::Refreshable
        } else {
            State::Valid
        }
    }

    /// Moves the expiration of this [`Session`] to the provided moment.
    pub fn extend(&mut self, expires_at: ExpirationDateTime) {
        self.expires_at = expires_at;
    }
}

/// State of a [`Session`] at some moment.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum State {
    /// [`Session`] is valid and doesn't require extension.
    Valid,

    /// [`Session`] is still valid, but expires soon and should be extended.
    Refreshable,

    /// [`Session`] has expired and cannot be used anymore.
    Expired,
}

/// Access token of a [`Session`].
///
/// Secret known to the client only. The storage keeps its [`Id`] instead.
#[derive(AsRef, Clone, Eq, PartialEq)]
#[as_ref(str)]
pub struct Token(String);

impl Token {
    /// Number of random bytes a [`Token`] is generated from.
    pub const ENTROPY_BYTES: usize = 32;

    /// Generates a new random [`Token`].
    ///
    /// # Errors
    ///
    /// If the OS random source is unavailable.
    pub fn generate() -> Result<Self, getrandom::Error> {
        let mut bytes = [0; Self::ENTROPY_BYTES];
        getrandom::getrandom(&mut bytes)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Returns the [`Id`] of a [`Session`] this [`Token`] identifies.
    #[must_use]
    pub fn id(&self) -> Id {
        Id::from(self)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl FromStr for Token {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

/// ID of a [`Session`].
///
/// Hex-encoded SHA-256 digest of the [`Token`], so a leaked [`Session`] cannot
/// be used to restore the [`Token`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Id(String);

impl From<&Token> for Id {
    fn from(token: &Token) -> Self {
        Self(hex::encode(Sha256::digest(token.0.as_bytes())))
    }
}

/// [`DateTime`] of a [`Session`] expiration.
pub type ExpirationDateTime = DateTimeOf<(Session, unit::Expiration)>;

#[cfg(test)]
mod spec {
    use std::{collections::HashSet, time::Duration};

    use common::{datetime::SignedDuration, DateTime};

    use crate::domain::member;

    use super::{ExpirationDateTime, Session, State, Token};

    fn session_expiring_at(expires_at: ExpirationDateTime) -> Session {
        Session::new(&Token::generate().unwrap(), member::Id::from(1), expires_at)
    }

    #[test]
    fn token_is_url_safe_and_unpadded() {
        let token = Token::generate().unwrap();
        let s: &str = token.as_ref();

        // 32 bytes encode into 43 base64 characters without padding.
        assert_eq!(s.len(), 43);
        assert!(s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn tokens_are_unique() {
        let tokens = (0..1000)
            .map(|_| Token::generate().unwrap().as_ref().to_owned())
            .collect::<HashSet<String>>();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn token_is_not_leaked_by_debug() {
        let token = Token::generate().unwrap();
        let s: &str = token.as_ref();
        assert!(!format!("{token:?}").contains(s));
    }

    #[test]
    fn id_is_deterministic() {
        let token: Token = "some-token".parse().unwrap();
        assert_eq!(token.id(), token.id());
        assert_eq!(token.id(), token.clone().id());

        let id = token.id();
        let hex: &str = id.as_ref();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn id_differs_for_different_tokens() {
        let a: Token = "token-a".parse().unwrap();
        let b: Token = "token-b".parse().unwrap();
        assert_ne!(a.id(), b.id());

        let ids = (0..1000)
            .map(|_| Token::generate().unwrap().id())
            .collect::<HashSet<_>>();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn id_does_not_contain_token() {
        let token = Token::generate().unwrap();
        let id = token.id();
        let (t, i): (&str, &str) = (token.as_ref(), id.as_ref());
        assert!(!i.contains(t));
    }

    #[test]
    fn expiration_boundary_is_closed() {
        let expires_at = DateTime::now().coerce();
        let session = session_expiring_at(expires_at);

        assert!(session.is_expired(expires_at.coerce()));
        assert!(!session
            .is_expired((expires_at - Duration::from_nanos(1)).coerce()));
        assert!(session.is_expired((expires_at + Duration::from_secs(1)).coerce()));
    }

    #[test]
    fn expired_session_is_never_refreshable() {
        let expires_at = DateTime::now().coerce();
        let session = session_expiring_at(expires_at);

        for buffer in [
            SignedDuration::ZERO,
            SignedDuration::seconds(1),
            SignedDuration::hours(2),
        ] {
            assert!(!session.is_refreshable(expires_at.coerce(), buffer));
            assert_eq!(
                session.state(expires_at.coerce(), buffer),
                State::Expired,
            );
        }
    }

    #[test]
    fn entering_buffer_window_is_refreshable() {
        let expires_at: ExpirationDateTime = DateTime::now().coerce();
        let session = session_expiring_at(expires_at);

        for buffer in [SignedDuration::seconds(1), SignedDuration::hours(2)] {
            let start = (expires_at - buffer).coerce();
            assert!(session.is_refreshable(start, buffer));
            assert!(!session
                .is_refreshable(start - Duration::from_nanos(1), buffer));
        }
    }

    #[test]
    fn negative_buffer_is_taken_by_absolute_value() {
        let expires_at: ExpirationDateTime = DateTime::now().coerce();
        let session = session_expiring_at(expires_at);
        let now = (expires_at - Duration::from_secs(30)).coerce();

        assert!(session.is_refreshable(now, SignedDuration::minutes(-1)));
        assert!(session.is_refreshable(now, SignedDuration::minutes(1)));
    }

    #[test]
    fn oversized_buffer_covers_whole_lifetime() {
        let now = DateTime::now();
        let session =
            session_expiring_at((now + Duration::from_secs(60)).coerce());

        for buffer in [
            SignedDuration::MAX,
            SignedDuration::MIN,
            SignedDuration::days(365 * 20_000),
        ] {
            assert!(session.is_refreshable(now, buffer));
            assert_eq!(session.state(now, buffer), State::Refreshable);
        }

        let expired = session_expiring_at((now - Duration::from_secs(1)).coerce());
        assert_eq!(expired.state(now, SignedDuration::MAX), State::Expired);
    }

    #[test]
    fn states_are_exhaustive() {
        let now = DateTime::now();
        let buffer = SignedDuration::hours(1);

        let valid = session_expiring_at((now + Duration::from_secs(7200)).coerce());
        let refreshable =
            session_expiring_at((now + Duration::from_secs(60)).coerce());
        let expired = session_expiring_at((now - Duration::from_secs(60)).coerce());

        assert_eq!(valid.state(now, buffer), State::Valid);
        assert_eq!(refreshable.state(now, buffer), State::Refreshable);
        assert_eq!(expired.state(now, buffer), State::Expired);
    }

    #[test]
    fn extend_moves_expiration() {
        let now = DateTime::now();
        let mut session =
            session_expiring_at((now + Duration::from_secs(60)).coerce());
        let later = (now + Duration::from_secs(3600)).coerce();

        session.extend(later);

        assert_eq!(session.expires_at, later);
        assert_eq!(session.state(now, SignedDuration::minutes(5)), State::Valid);
    }
}
