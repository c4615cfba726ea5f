//! Polymorphic object references.
//!
//! An audit event may point at one entity of a known kind. The kind is a
//! closed enumeration; resolving whether a referenced row exists is done
//! through the per-kind lookup table in `repositories::object_lookup`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a caller supplies an object kind outside the known set.
#[derive(Debug, Error)]
#[error("invalid object-type supplied: {0}")]
pub struct UnknownObjectKind(pub String);

macro_rules! object_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Kind of entity an audit event can reference.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
        #[sqlx(type_name = "TEXT", rename_all = "kebab-case")]
        pub enum ObjectKind {
            $($variant),+
        }

        impl ObjectKind {
            /// Canonical plural name used on the wire and in the
            /// `object_type` column.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ObjectKind::$variant => $name),+
                }
            }
        }

        impl FromStr for ObjectKind {
            type Err = UnknownObjectKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(ObjectKind::$variant),)+
                    other => Err(UnknownObjectKind(other.to_string())),
                }
            }
        }
    };
}

object_kinds! {
    Suppliers => "suppliers",
    Services => "services",
    Frameworks => "frameworks",
    Users => "users",
    Briefs => "briefs",
    Outcomes => "outcomes",
    BriefResponses => "brief-responses",
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ObjectKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ObjectKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kinds() {
        assert_eq!("suppliers".parse::<ObjectKind>().unwrap(), ObjectKind::Suppliers);
        assert_eq!(
            "brief-responses".parse::<ObjectKind>().unwrap(),
            ObjectKind::BriefResponses
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = "widgets".parse::<ObjectKind>().unwrap_err();
        assert!(err.to_string().contains("widgets"));
    }

    #[test]
    fn serializes_as_plural_name() {
        assert_eq!(
            serde_json::to_value(ObjectKind::BriefResponses).unwrap(),
            serde_json::json!("brief-responses")
        );
        let kind: ObjectKind = serde_json::from_value(serde_json::json!("services")).unwrap();
        assert_eq!(kind, ObjectKind::Services);
    }
}
