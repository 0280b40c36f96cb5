//! Date and time utilities.

#[cfg(feature = "postgres")]
use std::error::Error as StdError;
use std::{cmp::Ordering, marker::PhantomData, ops, time::Duration};

use derive_more::{Debug, Display, Error};
#[cfg(feature = "postgres")]
use postgres_types::{
    accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql, Type,
};
use time::{format_description::well_known::Rfc3339, UtcOffset};

/// Untyped date and time.
pub type DateTime = DateTimeOf;

/// Signed span of time, which may be negative.
pub type SignedDuration = time::Duration;

/// UTC date and time.
///
/// `Of` parameter describes what this date and time is about (creation,
/// expiration, etc.), so different kinds cannot be mixed up accidentally.
#[derive(Debug)]
pub struct DateTimeOf<Of: ?Sized = ()> {
    /// Inner representation of the date and time.
    inner: time::OffsetDateTime,

    /// Type parameter describing the kind of date and time.
    #[debug(skip)]
    _of: PhantomData<Of>,
}

impl<Of: ?Sized> DateTimeOf<Of> {
    /// Creates a new [`DateTime`] representing the current date and time.
    ///
    /// Precision is truncated to microseconds, as this is what Postgres
    /// stores.
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn now() -> Self {
        let inner = time::OffsetDateTime::now_utc();
        Self {
            _of: PhantomData,
            inner: inner
                .replace_microsecond(inner.microsecond())
                .expect("infallible"),
        }
    }

    /// Creates a new [`DateTime`] from the provided [RFC 3339] string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid [RFC 3339] date and time.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    pub fn from_rfc3339(input: &str) -> Result<Self, ParseError> {
        use ParseError as E;

        time::OffsetDateTime::parse(input, &Rfc3339)
            .map_err(E::Parse)?
            .try_into()
            .map_err(E::ComponentRange)
    }

    /// Returns the [`DateTime`] as an [RFC 3339] string.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.inner.format(&Rfc3339).unwrap_or_else(|e| {
            panic!("cannot format `DateTime` as RFC 3339: {e}")
        })
    }

    /// Returns the [`Duration`] elapsed from the `earlier` [`DateTime`] to
    /// this one, or zero if `earlier` is actually later.
    #[must_use]
    pub fn saturating_duration_since<OtherOf: ?Sized>(
        &self,
        earlier: DateTimeOf<OtherOf>,
    ) -> Duration {
        (self.inner - earlier.inner)
            .try_into()
            .unwrap_or(Duration::ZERO)
    }

    /// Adds the provided [`SignedDuration`] to this [`DateTime`], returning
    /// [`None`] if the result is out of the representable range.
    #[must_use]
    pub fn checked_add(self, rhs: SignedDuration) -> Option<Self> {
        self.inner.checked_add(rhs).map(|inner| Self {
            inner,
            _of: PhantomData,
        })
    }

    /// Subtracts the provided [`SignedDuration`] from this [`DateTime`],
    /// returning [`None`] if the result is out of the representable range.
    #[must_use]
    pub fn checked_sub(self, rhs: SignedDuration) -> Option<Self> {
        self.inner.checked_sub(rhs).map(|inner| Self {
            inner,
            _of: PhantomData,
        })
    }

    /// Adds the provided [`Duration`] to this [`DateTime`], clamping the
    /// result to the latest representable [`DateTime`].
    #[must_use]
    pub fn saturating_add(self, rhs: Duration) -> Self {
        let rhs = SignedDuration::try_from(rhs).unwrap_or(SignedDuration::MAX);
        Self {
            inner: self.inner.saturating_add(rhs),
            _of: PhantomData,
        }
    }

    /// Coerces one kind of [`DateTime`] into another.
    #[must_use]
    pub fn coerce<NewOf: ?Sized>(self) -> DateTimeOf<NewOf> {
        DateTimeOf {
            inner: self.inner,
            _of: PhantomData,
        }
    }
}

/// Error of parsing [`DateTime`] from a string.
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum ParseError {
    /// Failed to parse the string into an [`DateTime`].
    Parse(time::error::Parse),

    /// Parsed [`DateTime`] has an out of range component.
    ComponentRange(time::error::ComponentRange),
}

impl<Of: ?Sized> Copy for DateTimeOf<Of> {}
impl<Of: ?Sized> Clone for DateTimeOf<Of> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Of: ?Sized> Eq for DateTimeOf<Of> {}
impl<Of: ?Sized> PartialEq for DateTimeOf<Of> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<Of: ?Sized> Ord for DateTimeOf<Of> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<Of: ?Sized> PartialOrd for DateTimeOf<Of> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<Of: ?Sized> TryFrom<time::OffsetDateTime> for DateTimeOf<Of> {
    type Error = time::error::ComponentRange;

    fn try_from(dt: time::OffsetDateTime) -> Result<Self, Self::Error> {
        dt.to_offset(UtcOffset::UTC)
            .replace_microsecond(dt.microsecond())
            .map(|inner| Self {
                inner,
                _of: PhantomData,
            })
    }
}

impl<Of: ?Sized> From<DateTimeOf<Of>> for time::OffsetDateTime {
    fn from(dt: DateTimeOf<Of>) -> Self {
        dt.inner
    }
}

impl<Of: ?Sized> ops::Add<Duration> for DateTimeOf<Of> {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self {
            inner: self.inner + rhs,
            _of: PhantomData,
        }
    }
}

impl<Of: ?Sized> ops::Sub<Duration> for DateTimeOf<Of> {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self {
            inner: self.inner - rhs,
            _of: PhantomData,
        }
    }
}

impl<Of: ?Sized> ops::Add<SignedDuration> for DateTimeOf<Of> {
    type Output = Self;

    fn add(self, rhs: SignedDuration) -> Self::Output {
        Self {
            inner: self.inner + rhs,
            _of: PhantomData,
        }
    }
}

impl<Of: ?Sized> ops::Sub<SignedDuration> for DateTimeOf<Of> {
    type Output = Self;

    fn sub(self, rhs: SignedDuration) -> Self::Output {
        Self {
            inner: self.inner - rhs,
            _of: PhantomData,
        }
    }
}

#[cfg(feature = "postgres")]
impl<Of: ?Sized> FromSql<'_> for DateTimeOf<Of> {
    accepts!(TIMESTAMPTZ);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        time::OffsetDateTime::from_sql(ty, raw)?
            .try_into()
            .map_err(Box::from)
    }
}

#[cfg(feature = "postgres")]
impl<Of: ?Sized> ToSql for DateTimeOf<Of> {
    accepts!(TIMESTAMPTZ);
    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        w: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.inner.to_sql(ty, w)
    }
}

#[cfg(feature = "juniper")]
mod juniper {
    //! Module providing integration with [`juniper`] crate.

    use juniper::{graphql_scalar, InputValue, ScalarValue, Value};

    /// Date and time in a [RFC 3339] format with a microsecond precision.
    ///
    /// [RFC 3339]: https://tools.ietf.org/html/rfc3339
    #[graphql_scalar(with = Self, parse_token(String))]
    type DateTime = crate::DateTime;

    impl DateTime {
        fn to_output<S: ScalarValue>(dt: &DateTime) -> Value<S> {
            Value::scalar(dt.to_rfc3339())
        }

        fn from_input<S: ScalarValue>(
            input: &InputValue<S>,
        ) -> Result<Self, String> {
            input
                .as_string_value()
                .ok_or_else(|| {
                    format!(
                        "Cannot parse `DateTime` input scalar from \
                         non-string value: {input}",
                    )
                })
                .and_then(|s| {
                    Self::from_rfc3339(s).map_err(|e| {
                        format!("Cannot parse `DateTime` input scalar: {e}")
                    })
                })
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use super::{DateTime, SignedDuration};

    #[test]
    fn now_is_truncated_to_microseconds() {
        let now = time::OffsetDateTime::from(DateTime::now());
        assert_eq!(now.nanosecond() % 1_000, 0);
    }

    #[test]
    fn rfc3339_round_trip() {
        let dt = DateTime::from_rfc3339("2024-05-01T12:30:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-05-01T12:30:00Z");
        assert!(DateTime::from_rfc3339("yesterday").is_err());
    }

    #[test]
    fn signed_and_unsigned_arithmetic_agree() {
        let dt = DateTime::from_rfc3339("2024-05-01T12:00:00Z").unwrap();

        assert_eq!(
            dt + Duration::from_secs(10),
            dt + SignedDuration::seconds(10),
        );
        assert_eq!(
            dt - Duration::from_secs(10),
            dt - SignedDuration::seconds(10),
        );
        assert_eq!(
            dt - SignedDuration::seconds(-10),
            dt + Duration::from_secs(10),
        );
    }

    #[test]
    fn saturating_duration_since() {
        let earlier = DateTime::from_rfc3339("2024-05-01T12:00:00Z").unwrap();
        let later = DateTime::from_rfc3339("2024-05-01T12:01:00Z").unwrap();

        assert_eq!(
            later.saturating_duration_since(earlier),
            Duration::from_secs(60),
        );
        assert_eq!(earlier.saturating_duration_since(later), Duration::ZERO);
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let dt = DateTime::from_rfc3339("2024-05-01T12:00:00Z").unwrap();

        assert_eq!(
            dt.checked_sub(SignedDuration::hours(1)),
            Some(dt - Duration::from_secs(3600)),
        );
        assert_eq!(
            dt.checked_add(SignedDuration::hours(1)),
            Some(dt + Duration::from_secs(3600)),
        );
        assert_eq!(dt.checked_sub(SignedDuration::MAX), None);
        assert_eq!(dt.checked_sub(SignedDuration::days(365 * 20_000)), None);
        assert_eq!(dt.checked_add(SignedDuration::MAX), None);
    }

    #[test]
    fn saturating_add_clamps_to_latest_date() {
        let dt = DateTime::from_rfc3339("2024-05-01T12:00:00Z").unwrap();

        assert_eq!(
            dt.saturating_add(Duration::from_secs(60)),
            dt + Duration::from_secs(60),
        );

        let max = dt.saturating_add(Duration::MAX);
        assert_eq!(dt.saturating_add(Duration::from_secs(u64::MAX / 2)), max);
        assert!(max > dt);
    }
}
