//! [`Role`] definitions.

use std::{str::FromStr, sync::LazyLock};

use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;

#[cfg(doc)]
use crate::domain::{Member, Permission};

/// Named bundle of [`Permission`]s assignable to a [`Member`].
///
/// Reference data, never modified by this service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Role {
    /// ID of this [`Role`].
    pub id: Id,

    /// Unique [`Name`] of this [`Role`].
    pub name: Name,

    /// Human-readable name of this [`Role`].
    pub display_name: String,

    /// Description of this [`Role`].
    pub description: String,
}

/// ID of a [`Role`].
#[derive(
    Clone, Copy, Debug, Display, Eq, From, Hash, Into, Ord, PartialEq, PartialOrd,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(i64);

/// Unique machine-readable name of a [`Role`] (`editor`, `admin`, etc.).
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str)]
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
        /// Regular expression checking [`Name`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[a-z][a-z0-9_-]{0,63}$").expect("valid regex")
        });

        REGEX.is_match(name.as_ref())
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `role::Name`")
    }
}

#[cfg(test)]
pub(crate) mod spec {
    use super::{Id, Name, Role};

    pub(crate) fn role(id: i64, name: &str) -> Role {
        Role {
            id: Id::from(id),
            name: Name::new(name).unwrap(),
            display_name: name.to_owned(),
            description: String::new(),
        }
    }

    #[test]
    fn name_format() {
        assert!(Name::new("editor").is_some());
        assert!(Name::new("event-manager_2").is_some());
        assert!(Name::new("Editor").is_none());
        assert!(Name::new("2editor").is_none());
        assert!(Name::new("").is_none());
        assert!(Name::new("a".repeat(65)).is_none());
    }
}
