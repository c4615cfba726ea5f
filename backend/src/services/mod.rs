pub mod audit_query;
pub mod audit_trail;
