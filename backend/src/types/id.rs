//! Typed ID wrappers for compile-time type safety.
//!
//! These types wrap the integer primary keys handed out by the database
//! to prevent accidental mixing of different entity IDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Macro to generate typed ID wrappers with common trait implementations.
macro_rules! typed_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Serialize,
            Deserialize,
            sqlx::Type,
        )]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps an existing database identifier.
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the inner integer value.
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define all typed IDs
typed_id!(AuditEventId, "Unique identifier for an audit event.");
typed_id!(SupplierId, "Internal identifier for a supplier row.");
typed_id!(ServiceId, "Internal identifier for a service row.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_i64() {
        let id = AuditEventId::new(42);
        assert_eq!(id.get(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(AuditEventId::from(42), id);
    }

    #[test]
    fn parses_and_displays() {
        let id: AuditEventId = "17".parse().expect("parse id");
        assert_eq!(id, AuditEventId::new(17));
        assert_eq!(id.to_string(), "17");
        assert!("seventeen".parse::<AuditEventId>().is_err());
    }

    #[test]
    fn serializes_as_plain_integer() {
        let id = ServiceId::new(7);
        assert_eq!(serde_json::to_value(id).unwrap(), serde_json::json!(7));
        let back: ServiceId = serde_json::from_value(serde_json::json!(7)).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_order_within_one_type() {
        let a = SupplierId::new(1);
        let b = SupplierId::new(2);
        assert!(a < b);
    }
}
