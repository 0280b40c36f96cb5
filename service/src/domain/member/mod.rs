//! [`Member`] definitions.

pub mod session;

use std::{fmt, sync::LazyLock};

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher as _, PasswordVerifier as _,
};
#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use secrecy::{zeroize::Zeroize, CloneableSecret};
use tracing as log;

pub use self::session::Session;

/// Registered member of the platform.
#[derive(Clone, Debug)]
pub struct Member {
    /// ID of this [`Member`].
    pub id: Id,

    /// [`Email`] of this [`Member`].
    pub email: Email,

    /// First [`Name`] of this [`Member`].
    pub first_name: Name,

    /// Last [`Name`] of this [`Member`].
    pub last_name: Name,

    /// [`DateTime`] when this [`Member`] was registered.
    pub created_at: CreationDateTime,
}

/// Data of a [`Member`] not stored yet.
///
/// Its [`Id`] is assigned by the storage on insertion.
#[derive(Clone, Debug)]
pub struct Draft {
    /// [`Email`] of the new [`Member`].
    pub email: Email,

    /// First [`Name`] of the new [`Member`].
    pub first_name: Name,

    /// Last [`Name`] of the new [`Member`].
    pub last_name: Name,

    /// [`PasswordHash`] of the new [`Member`].
    pub password_hash: PasswordHash,

    /// [`DateTime`] when the new [`Member`] is registered.
    pub created_at: CreationDateTime,
}

impl Draft {
    /// Turns this [`Draft`] into a [`Member`] with the provided [`Id`].
    #[must_use]
    pub fn into_member(self, id: Id) -> Member {
        let Self {
            email,
            first_name,
            last_name,
            password_hash: _,
            created_at,
        } = self;
        Member {
            id,
            email,
            first_name,
            last_name,
            created_at,
        }
    }
}

/// ID of a [`Member`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(i64);

/// First or last name of a [`Member`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.len() <= 256
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Email address of a [`Member`].
///
/// Serves as the login of a [`Member`], so is unique across all of them.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Email(String);

impl Email {
    /// Creates a new [`Email`] if the given `address` is valid.
    ///
    /// The `address` is lowercased, so the same mailbox cannot be registered
    /// twice with a different letter case.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into().to_lowercase();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a valid [`Email`].
    fn check(address: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Email`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                "^([^\\x00-\\x20\\x22\\x28\\x29\\x2c\\x2e\\x3a-\
                     \\x3c\\x3e\\x40\\x5b-\\x5d\\x7f-\\xff]+\
                  |\\x22([^\\x0d\\x22\\x5c\\x80-\\xff]\
                  |\\x5c[\\x00-\\x7f])*\\x22)\
                  (\\x2e([^\\x00-\\x20\\x22\\x28\\x29\\x2c\\x2e\\x3a-\
                           \\x3c\\x3e\\x40\\x5b-\\x5d\\x7f-\\xff]+\
                        |\\x22([^\\x0d\\x22\\x5c\\x80-\\xff]\
                        |\\x5c[\\x00-\\x7f])*\\x22))*\\x40\
                  ([^\\x00-\\x20\\x22\\x28\\x29\\x2c\\x2e\\x3a-\
                     \\x3c\\x3e\\x40\\x5b-\\x5d\\x7f-\\xff]+\
                  |\\x5b([^\\x0d\\x5b-\\x5d\\x80-\\xff]\
                        |\\x5c[\\x00-\\x7f])*\\x5d)\
                  (\\x2e([^\\x00-\\x20\\x22\\x28\\x29\\x2c\\x2e\\x3a-\
                           \\x3c\\x3e\\x40\\x5b-\\x5d\\x7f-\\xff]+\
                        |\\x5b([^\\x0d\\x5b-\\x5d\\x80-\\xff]\
                        |\\x5c[\\x00-\\x7f])*\\x5d))*$",
            )
            .expect("valid regex")
        });

        address.as_ref().len() <= 320 && REGEX.is_match(address.as_ref())
    }
}

impl FromStr for Email {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Email`")
    }
}

/// Password of a [`Member`].
#[derive(Clone, Eq, PartialEq)]
pub struct Password(String);

impl Password {
    /// Creates a new [`Password`] if the given `password` is valid.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Option<Self> {
        let password = password.into();
        Self::check(&password).then_some(Self(password))
    }

    /// Checks whether the given `password` is a valid [`Password`].
    fn check(password: impl AsRef<str>) -> bool {
        let password = password.as_ref();
        password.len() >= 8 && password.len() <= 128
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl FromStr for Password {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Password`")
    }
}

impl CloneableSecret for Password {}
impl Zeroize for Password {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Password hash of a [`Member`], in the [PHC string format].
///
/// [PHC string format]: https://github.com/P-H-C/phc-string-format
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes the given [`Password`] with Argon2id and a random salt.
    ///
    /// # Errors
    ///
    /// If the hashing itself fails, which happens only on misconfigured
    /// algorithm parameters.
    pub fn new(
        password: &Password,
    ) -> Result<Self, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.0.as_bytes(), &salt)
            .map(|h| Self(h.to_string()))
    }

    /// Checks whether the given [`Password`] matches this [`PasswordHash`].
    #[must_use]
    pub fn verify(&self, password: &Password) -> bool {
        let hash = match argon2::PasswordHash::new(&self.0) {
            Ok(h) => h,
            Err(e) => {
                log::error!("malformed `PasswordHash` is stored: {e}");
                return false;
            }
        };
        Argon2::default()
            .verify_password(password.0.as_bytes(), &hash)
            .is_ok()
    }

    /// Checks the given [`Password`] against a throwaway [`PasswordHash`],
    /// taking as long as [`PasswordHash::verify()`] does.
    ///
    /// Always returns `false`.
    #[must_use]
    pub fn verify_none(password: &Password) -> bool {
        if let Some(hash) = Self::throwaway() {
            _ = hash.verify(password);
        }
        false
    }

    /// Returns the [`PasswordHash`] used by [`PasswordHash::verify_none()`].
    fn throwaway() -> Option<&'static Self> {
        /// Lazily computed throwaway [`PasswordHash`].
        static HASH: LazyLock<Option<PasswordHash>> = LazyLock::new(|| {
            PasswordHash::new(&Password("throwaway password".to_owned()))
                .inspect_err(|e| {
                    log::error!("failed to hash throwaway `Password`: {e}");
                })
                .ok()
        });

        HASH.as_ref()
    }
}

/// [`DateTime`] when a [`Member`] was registered.
pub type CreationDateTime = DateTimeOf<(Member, unit::Creation)>;

#[cfg(test)]
mod spec {
    use super::{Email, Name, Password, PasswordHash};

    #[test]
    fn email_is_validated_and_lowercased() {
        let email = Email::new("Jane.Doe@Example.com").unwrap();
        assert_eq!(email.to_string(), "jane.doe@example.com");

        assert!(Email::new("jane@example").is_some());
        assert!(Email::new("jane").is_none());
        assert!(Email::new("jane@").is_none());
        assert!(Email::new("@example.com").is_none());
    }

    #[test]
    fn name_rejects_untrimmed() {
        assert!(Name::new("Jane").is_some());
        assert!(Name::new(" Jane").is_none());
        assert!(Name::new("").is_none());
    }

    #[test]
    fn password_length_is_bounded() {
        assert!(Password::new("secret123").is_some());
        assert!(Password::new("short").is_none());
        assert!(Password::new("x".repeat(129)).is_none());
    }

    #[test]
    fn every_constructor_validates() {
        assert!("secret123".parse::<Password>().is_ok());
        assert!("short".parse::<Password>().is_err());
        assert!("x".repeat(129).parse::<Password>().is_err());
        assert!(" Jane".parse::<Name>().is_err());
        assert_eq!(
            "Jane@Example.com".parse::<Email>().unwrap(),
            Email::new("jane@example.com").unwrap(),
        );
    }

    #[test]
    fn password_is_not_leaked_by_debug() {
        let password = Password::new("secret123").unwrap();
        assert!(!format!("{password:?}").contains("secret123"));
    }

    #[test]
    fn password_hash_verifies_only_original_password() {
        let password = Password::new("secret123").unwrap();
        let hash = PasswordHash::new(&password).unwrap();

        assert!(hash.to_string().starts_with("$argon2id$"));
        assert!(hash.verify(&password));
        assert!(!hash.verify(&Password::new("different").unwrap()));
    }

    #[test]
    fn password_hash_is_salted() {
        let password = Password::new("secret123").unwrap();

        assert_ne!(
            PasswordHash::new(&password).unwrap(),
            PasswordHash::new(&password).unwrap(),
        );
    }

    #[test]
    fn verify_none_spends_a_real_verification() {
        let hash = PasswordHash::throwaway().unwrap();
        assert!(hash.to_string().starts_with("$argon2id$"));

        let password = Password::new("throwaway password").unwrap();
        assert!(hash.verify(&password));
        assert!(!PasswordHash::verify_none(&password));

        let other = Password::new("secret123").unwrap();
        assert!(!PasswordHash::verify_none(&other));
    }

    #[test]
    fn malformed_password_hash_never_verifies() {
        let hash = PasswordHash("plain".to_owned());
        assert!(!hash.verify(&Password::new("plain-text").unwrap()));
    }
}
