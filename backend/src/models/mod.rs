//! Data models shared across database access and API handlers.

pub mod audit_event;
pub mod object_ref;

pub use audit_event::{AuditEvent, AuditEventType, UnknownAuditType};
pub use object_ref::{ObjectKind, UnknownObjectKind};
