//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A string did not name any known variant.
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    /// A numeric setting was outside its allowed range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
        value: u32,
    },

    /// A measurement value was not a finite, non-negative number.
    #[error("invalid {field} value: {value}")]
    InvalidValue { field: &'static str, value: f64 },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Generates a unit-variant enum with a canonical snake-case string form.
///
/// The string form is used for storage, the CLI and the HTTP store, so
/// `Display`, `FromStr` and serde all agree on it.
macro_rules! define_string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Canonical string representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::types::ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err($crate::types::ValidationError::UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use define_string_enum;

define_string_id!(
    /// Identifier assigned to a measurement by the external health store.
    ///
    /// Unique within the store; at most one local measurement or tombstone
    /// may carry a given external ID.
    ExternalId, "external ID"
);

define_string_enum!(
    /// Biological sex, as used by the energy and body composition equations.
    BiologicalSex, "biological sex" {
        Female => "female",
        Male => "male",
    }
);

define_string_enum!(
    /// Smoking status.
    SmokingStatus, "smoking status" {
        NonSmoker => "non_smoker",
        Smoker => "smoker",
    }
);

define_string_enum!(
    /// Pregnancy status for a single day.
    PregnancyStatus, "pregnancy status" {
        NotPregnant => "not_pregnant",
        Pregnant => "pregnant",
        Lactating => "lactating",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_id_rejects_empty() {
        let err = ExternalId::new("").unwrap_err();
        assert_eq!(err, ValidationError::Empty { field: "external ID" });
    }

    #[test]
    fn external_id_deserialize_validates() {
        let parsed: Result<ExternalId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());

        let parsed: ExternalId = serde_json::from_str("\"hk-1\"").unwrap();
        assert_eq!(parsed.as_str(), "hk-1");
    }

    #[test]
    fn string_enums_parse_their_display_form() {
        for sex in BiologicalSex::ALL {
            assert_eq!(sex.to_string().parse::<BiologicalSex>().unwrap(), *sex);
        }
        for status in PregnancyStatus::ALL {
            assert_eq!(status.to_string().parse::<PregnancyStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn string_enum_serde_matches_display() {
        let json = serde_json::to_string(&SmokingStatus::NonSmoker).unwrap();
        assert_eq!(json, "\"non_smoker\"");
    }

    #[test]
    fn unknown_variant_errors() {
        let err = "other".parse::<BiologicalSex>().unwrap_err();
        assert_eq!(err.to_string(), "unknown biological sex: other");
    }
}
