//! [`Permission`] definitions.

use std::{str::FromStr, sync::LazyLock};

use derive_more::{AsRef, Display, Error, From, Into, IntoIterator};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;

#[cfg(doc)]
use crate::domain::{Member, Role};

/// Atomic named capability granted to a [`Member`] through a [`Role`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Permission {
    /// ID of this [`Permission`].
    pub id: Id,

    /// Unique [`Name`] of this [`Permission`].
    pub name: Name,

    /// Human-readable name of this [`Permission`].
    pub display_name: String,

    /// Description of this [`Permission`].
    pub description: String,
}

/// ID of a [`Permission`].
#[derive(
    Clone, Copy, Debug, Display, Eq, From, Hash, Into, Ord, PartialEq, PartialOrd,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(i64);

/// Unique name of a [`Permission`], like `edit:event`.
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
        /// Regular expression checking [`Name`] invariants:
        /// - Must consist of lowercase `:`-separated segments;
        /// - Each segment must start with a letter;
        /// - Must be at most 128 characters long.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[a-z][a-z0-9_-]*(:[a-z][a-z0-9_-]*)*$")
                .expect("valid regex")
        });

        let name = name.as_ref();
        name.len() <= 128 && REGEX.is_match(name)
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `permission::Name`")
    }
}

/// Ordered list of [`Permission`]s with set-like queries.
///
/// May contain duplicates when the same [`Permission`] is granted by several
/// [`Role`]s, which doesn't affect any of its queries.
#[derive(Clone, Debug, Default, Eq, From, Into, IntoIterator, PartialEq)]
pub struct Collection(#[into_iterator(owned, ref)] Vec<Permission>);

impl Collection {
    /// Creates a new empty [`Collection`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns [`Name`]s of all the [`Permission`]s in this [`Collection`],
    /// in the order they were added.
    pub fn names(&self) -> impl Iterator<Item = &Name> {
        self.0.iter().map(|p| &p.name)
    }

    /// Checks whether this [`Collection`] contains a [`Permission`] with the
    /// provided `name`.
    #[must_use]
    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        self.names().any(|n| n.as_ref() == name)
    }

    /// Checks whether this [`Collection`] contains [`Permission`]s with all
    /// the `required` names.
    ///
    /// # Errors
    ///
    /// With the first of the `required` names missing in this [`Collection`].
    pub fn contains_all<I>(&self, required: I) -> Result<(), Missing>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for name in required {
            if !self.contains(&name) {
                return Err(Missing(name.as_ref().to_owned()));
            }
        }
        Ok(())
    }

    /// Appends all the [`Permission`]s of the `other` [`Collection`] to this
    /// one.
    pub fn append(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Returns the number of [`Permission`]s in this [`Collection`],
    /// duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether this [`Collection`] has no [`Permission`]s.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Permission> for Collection {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Error of a required [`Permission`] being absent in a [`Collection`].
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
#[display("missing `{_0}` permission")]
pub struct Missing(#[error(not(source))] pub String);

#[cfg(test)]
pub(crate) mod spec {
    use super::{Collection, Id, Missing, Name, Permission};

    pub(crate) fn permission(id: i64, name: &str) -> Permission {
        Permission {
            id: Id::from(id),
            name: Name::new(name).unwrap(),
            display_name: name.to_uppercase(),
            description: String::new(),
        }
    }

    #[test]
    fn name_format() {
        assert!(Name::new("edit:event").is_some());
        assert!(Name::new("admin").is_some());
        assert!(Name::new("view:event:draft").is_some());
        assert!(Name::new("Edit:Event").is_none());
        assert!(Name::new("edit:").is_none());
        assert!(Name::new(":event").is_none());
        assert!(Name::new("").is_none());
    }

    #[test]
    fn names_preserve_order_and_duplicates() {
        let perms = Collection::from(vec![
            permission(2, "view:event"),
            permission(1, "edit:event"),
            permission(2, "view:event"),
        ]);

        assert_eq!(
            perms.names().map(ToString::to_string).collect::<Vec<_>>(),
            ["view:event", "edit:event", "view:event"],
        );
    }

    #[test]
    fn empty_collection_contains_nothing() {
        let perms = Collection::new();

        assert_eq!(perms.contains_all::<[&str; 0]>([]), Ok(()));
        assert_eq!(
            perms.contains_all(["view:event"]),
            Err(Missing("view:event".to_owned())),
        );
    }

    #[test]
    fn contains_all_fails_on_first_missing() {
        let perms = Collection::from(vec![
            permission(1, "edit:event"),
            permission(2, "view:event"),
        ]);

        assert_eq!(perms.contains_all(["view:event", "edit:event"]), Ok(()));
        assert_eq!(
            perms.contains_all(["view:event", "delete:event", "ban:member"]),
            Err(Missing("delete:event".to_owned())),
        );
    }

    #[test]
    fn duplicates_satisfy_single_requirement() {
        let mut perms = Collection::from(vec![permission(1, "edit:event")]);
        perms.append(Collection::from(vec![permission(1, "edit:event")]));

        assert_eq!(perms.len(), 2);
        assert_eq!(perms.contains_all(["edit:event"]), Ok(()));
        assert_eq!(perms.contains_all(["edit:event", "edit:event"]), Ok(()));
    }
}
