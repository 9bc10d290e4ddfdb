//! Conversion between Rust field types and engine values

use chrono::NaiveDateTime;
use std::time::Duration;
use taskql::Value;
use uuid::Uuid;

use crate::schema::{FieldError, FieldKind};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A Rust type that can live in one column
pub trait SqlField: Sized {
    fn kind() -> FieldKind;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, FieldError>;
}

impl SqlField for String {
    fn kind() -> FieldKind {
        FieldKind::Text
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(FieldError::mismatch("text", &other)),
        }
    }
}

impl SqlField for i64 {
    fn kind() -> FieldKind {
        FieldKind::Long
    }

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(FieldError::mismatch("integer", &other)),
        }
    }
}

impl SqlField for i32 {
    fn kind() -> FieldKind {
        FieldKind::Int
    }

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| FieldError::Invalid(format!("{} does not fit in a 32-bit integer", wide)))
    }
}

impl SqlField for f64 {
    fn kind() -> FieldKind {
        FieldKind::Double
    }

    fn to_value(&self) -> Value {
        Value::Real(*self)
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        value.as_f64().ok_or_else(|| FieldError::mismatch("real", &value))
    }
}

impl SqlField for bool {
    fn kind() -> FieldKind {
        FieldKind::Bool
    }

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Integer(i) => Ok(i != 0),
            other => Err(FieldError::mismatch("boolean", &other)),
        }
    }
}

impl SqlField for Uuid {
    fn kind() -> FieldKind {
        FieldKind::Uuid
    }

    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Text(s) => Uuid::parse_str(&s).map_err(|e| FieldError::Invalid(format!("'{}' is not a UUID: {}", s, e))),
            other => Err(FieldError::mismatch("uuid text", &other)),
        }
    }
}

impl SqlField for NaiveDateTime {
    fn kind() -> FieldKind {
        FieldKind::DateTime
    }

    fn to_value(&self) -> Value {
        Value::Text(self.format(TIMESTAMP_FORMAT).to_string())
    }

    /// Accepts both `CURRENT_TIMESTAMP` output and ISO-8601 with a `T`.
    fn from_value(value: Value) -> Result<Self, FieldError> {
        match value {
            Value::Text(s) => NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
                .or_else(|_| s.parse::<NaiveDateTime>())
                .map_err(|e| FieldError::Invalid(format!("'{}' is not a timestamp: {}", s, e))),
            other => Err(FieldError::mismatch("timestamp text", &other)),
        }
    }
}

impl SqlField for Duration {
    fn kind() -> FieldKind {
        FieldKind::Duration
    }

    fn to_value(&self) -> Value {
        Value::Real(self.as_secs_f64())
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        let secs = value.as_f64().ok_or_else(|| FieldError::mismatch("seconds", &value))?;
        Duration::try_from_secs_f64(secs).map_err(|e| FieldError::Invalid(format!("{} seconds: {}", secs, e)))
    }
}

impl<T: SqlField> SqlField for Option<T> {
    fn kind() -> FieldKind {
        T::kind()
    }

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, FieldError> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

/// Declare an enum persisted by constant name
///
/// ```ignore
/// taskdb::text_enum! {
///     pub enum PlayerRole {
///         Admin => "ADMIN",
///         Member => "MEMBER",
///     }
/// }
/// ```
#[macro_export]
macro_rules! text_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            /// Stored constants, in declaration order
            pub const VARIANTS: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::schema::FieldError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err($crate::schema::FieldError::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl $crate::query::SqlField for $name {
            fn kind() -> $crate::schema::FieldKind {
                $crate::schema::FieldKind::Enum(Self::VARIANTS)
            }

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Text(self.as_str().to_string())
            }

            fn from_value(value: $crate::Value) -> ::std::result::Result<Self, $crate::schema::FieldError> {
                match value {
                    $crate::Value::Text(s) => s.parse(),
                    other => Err($crate::schema::FieldError::mismatch(stringify!($name), &other)),
                }
            }
        }
    };
}
