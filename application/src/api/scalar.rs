//! GraphQL scalar definitions.

use std::{borrow::Cow, fmt, marker::PhantomData, str::FromStr};

use juniper::{
    GraphQLType, InputValue, ParseScalarResult, ParseScalarValue, ScalarToken,
    ScalarValue, Value,
};

/// Helper type to use in `#[graphql(with = ..)]` attribute of newtypes over
/// domain values.
///
/// The domain type `As` is represented as a string scalar:
/// - its [`Display`] impl produces the output;
/// - its [`FromStr`] impl validates the input.
///
/// Target type must implement [`TryFrom`] and [`AsRef`] for `As` type.
///
/// [`Display`]: fmt::Display
#[derive(Debug)]
pub struct Via<As>(PhantomData<As>);

impl<As> Via<As> {
    /// Converts the target type into a string scalar [`Value`].
    pub fn to_output<T, S>(value: &T) -> Value<S>
    where
        As: fmt::Display,
        T: AsRef<As>,
        S: ScalarValue,
    {
        Value::from(value.as_ref().to_string())
    }

    /// Constructs the target type from a string scalar [`InputValue`].
    ///
    /// # Errors
    ///
    /// If the input value is not a string, or is rejected by `As` or the
    /// target type.
    pub fn from_input<T, S>(input: &InputValue<S>) -> Result<T, String>
    where
        As: FromStr,
        As::Err: fmt::Display,
        T: TryFrom<As> + GraphQLType<S, TypeInfo = ()>,
        T::Error: fmt::Display,
        S: ScalarValue,
    {
        let Some(s) = input.as_string_value() else {
            return Err(format!(
                "Cannot parse input scalar `{}`: expected string input \
                 value, found: {input}",
                name::<T, S>(),
            ));
        };
        let value = s.parse::<As>().map_err(|e| {
            format!(
                "Cannot parse input scalar `{}` from \"{s}\" string: {e}",
                name::<T, S>(),
            )
        })?;
        T::try_from(value).map_err(|e| {
            format!("Cannot parse input scalar `{}`: {e}", name::<T, S>())
        })
    }

    /// Parses the provided [`ScalarToken`] as a [`String`].
    ///
    /// # Errors
    ///
    /// If the token is not a string literal.
    pub fn parse_token<S: ScalarValue>(
        value: ScalarToken<'_>,
    ) -> ParseScalarResult<S> {
        <String as ParseScalarValue<S>>::from_str(value)
    }
}

/// Returns the GraphQL name of the `T` scalar.
fn name<T, S>() -> Cow<'static, str>
where
    T: GraphQLType<S, TypeInfo = ()>,
    S: ScalarValue,
{
    T::name(&()).map_or(Cow::Borrowed("<unnamed>"), |n| Cow::Owned(n.into()))
}

#[cfg(test)]
mod spec {
    use juniper::{DefaultScalarValue, InputValue, Value};
    use service::domain;

    use super::Via;
    use crate::api::member::{Email, PermissionName};

    type Input = InputValue<DefaultScalarValue>;

    #[test]
    fn parses_valid_input() {
        let email: Email = Via::<domain::member::Email>::from_input(
            &Input::scalar("John@Example.com".to_owned()),
        )
        .unwrap();

        assert_eq!(
            Via::<domain::member::Email>::to_output::<_, DefaultScalarValue>(
                &email,
            ),
            Value::scalar("john@example.com".to_owned()),
        );
    }

    #[test]
    fn rejects_malformed_input() {
        let err = Via::<domain::permission::Name>::from_input::<
            PermissionName,
            DefaultScalarValue,
        >(&Input::scalar("edit event".to_owned()))
        .unwrap_err();
        assert!(err.contains("`PermissionName`"), "{err}");

        let err = Via::<domain::permission::Name>::from_input::<
            PermissionName,
            DefaultScalarValue,
        >(&Input::scalar(42))
        .unwrap_err();
        assert!(err.contains("expected string"), "{err}");
    }
}
