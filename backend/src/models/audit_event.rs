//! The audit event record and its domain enumerations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sqlx::FromRow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::models::object_ref::ObjectKind;
use crate::types::AuditEventId;

/// Raised when a caller supplies an audit type outside the known set.
#[derive(Debug, Error)]
#[error("invalid audit type supplied: {0}")]
pub struct UnknownAuditType(pub String);

macro_rules! audit_event_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Domain event kinds recorded in the audit trail.
        ///
        /// Stored as text; the canonical names are the snake_case strings
        /// the surrounding application has always used on the wire.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
        #[sqlx(type_name = "TEXT", rename_all = "snake_case")]
        pub enum AuditEventType {
            $($variant),+
        }

        impl AuditEventType {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(AuditEventType::$variant => $name),+
                }
            }
        }

        impl FromStr for AuditEventType {
            type Err = UnknownAuditType;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(AuditEventType::$variant),)+
                    other => Err(UnknownAuditType(other.to_string())),
                }
            }
        }
    };
}

audit_event_types! {
    CreateUser => "create_user",
    UpdateUser => "update_user",
    UserAuthFailed => "user_auth_failed",
    SupplierUpdate => "supplier_update",
    DuplicateSupplier => "duplicate_supplier",
    UpdateService => "update_service",
    CreateDraftService => "create_draft_service",
    UpdateDraftService => "update_draft_service",
    DeleteDraftService => "delete_draft_service",
    PublishDraftService => "publish_draft_service",
    CreateBrief => "create_brief",
    UpdateBrief => "update_brief",
    UpdateBriefStatus => "update_brief_status",
    DeleteBrief => "delete_brief",
    AddBriefClarificationQuestion => "add_brief_clarification_question",
    CreateBriefResponse => "create_brief_response",
    UpdateBriefResponse => "update_brief_response",
    SubmitBriefResponse => "submit_brief_response",
    CreateApplication => "create_application",
    SubmitApplication => "submit_application",
    ApproveApplication => "approve_application",
    RevertApplication => "revert_application",
    DeleteApplication => "delete_application",
    UpdateOutcome => "update_outcome",
    CompleteOutcome => "complete_outcome",
    CreateAgreement => "create_agreement",
    UpdateAgreement => "update_agreement",
    SignAgreement => "sign_agreement",
    CountersignAgreement => "countersign_agreement",
    RegisterFrameworkInterest => "register_framework_interest",
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AuditEventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuditEventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single audit trail record.
///
/// Immutable after insert apart from the three acknowledgement fields,
/// which transition exactly once from `(false, None, None)` to
/// `(true, Some(ts), Some(actor))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: AuditEventId,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub event_type: AuditEventType,
    pub created_at: DateTime<Utc>,
    pub user: Option<String>,
    pub data: Value,
    pub object_type: Option<ObjectKind>,
    pub object_id: Option<i64>,
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub acknowledged_by: Option<String>,
}

impl AuditEvent {
    /// Canonical total order used everywhere in the audit subsystem:
    /// `created_at` first, then `id` as tie-breaker. `created_at` is not
    /// unique, so the id comparison is load-bearing.
    pub fn canonical_cmp(&self, other: &AuditEvent) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then(self.id.cmp(&other.id))
    }

    /// The `(kind, internal id)` pair this event points at, when both
    /// halves are present. The halves are written together or not at
    /// all, so a lone half is treated as no reference.
    pub fn object_ref(&self) -> Option<(ObjectKind, i64)> {
        match (self.object_type, self.object_id) {
            (Some(kind), Some(id)) => Some((kind, id)),
            _ => None,
        }
    }

    /// Supplier id carried in the payload, under the current key or the
    /// legacy one written by older clients.
    pub fn data_supplier_id(&self) -> Option<i64> {
        numeric_data_field(&self.data, &["supplierId", "supplier_id"])
    }

    /// Draft service id carried in the payload, current key first.
    pub fn data_draft_service_id(&self) -> Option<i64> {
        numeric_data_field(&self.data, &["draftId", "draft_id"])
    }
}

/// Reads the first of `keys` present in `data` and normalizes it to an
/// integer. Older rows store these ids as JSON strings, newer ones as
/// numbers. A stored string must be the plain decimal form: the store
/// compares these fields as text against the decimal rendering of the
/// queried id, and this function must agree with that comparison.
pub fn numeric_data_field(data: &Value, keys: &[&str]) -> Option<i64> {
    let value = keys.iter().find_map(|key| data.get(*key))?;
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => {
            let n: i64 = s.parse().ok()?;
            (n.to_string() == *s).then_some(n)
        }
        _ => None,
    }
}
