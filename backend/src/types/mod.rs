mod id;

pub use id::{AuditEventId, ServiceId, SupplierId};
