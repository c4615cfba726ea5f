pub mod audit_event;
pub mod object_lookup;
pub mod transaction;
