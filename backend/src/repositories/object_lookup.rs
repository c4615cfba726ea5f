//! Per-kind lookup table for polymorphic object references.
//!
//! Audit events point at heterogeneous entity tables via
//! `(object_type, object_id)`. Callers address those entities by their
//! externally-facing identifier (a supplier code, a service id, a
//! framework slug); this module maps each kind to the table and columns
//! needed to resolve an external id to the internal primary key the
//! event rows store.

use sqlx::{FromRow, PgPool};

use crate::models::ObjectKind;
use crate::types::{ServiceId, SupplierId};

#[derive(Debug, Clone, Copy)]
pub struct KindLookup {
    pub table: &'static str,
    pub external_id_column: &'static str,
    pub pk_column: &'static str,
}

/// The only place that knows which table backs which object kind.
pub const fn lookup(kind: ObjectKind) -> KindLookup {
    match kind {
        ObjectKind::Suppliers => KindLookup {
            table: "suppliers",
            external_id_column: "code",
            pk_column: "id",
        },
        ObjectKind::Services => KindLookup {
            table: "services",
            external_id_column: "service_id",
            pk_column: "id",
        },
        ObjectKind::Frameworks => KindLookup {
            table: "frameworks",
            external_id_column: "slug",
            pk_column: "id",
        },
        ObjectKind::Users => KindLookup {
            table: "users",
            external_id_column: "id",
            pk_column: "id",
        },
        ObjectKind::Briefs => KindLookup {
            table: "briefs",
            external_id_column: "id",
            pk_column: "id",
        },
        ObjectKind::Outcomes => KindLookup {
            table: "outcomes",
            external_id_column: "external_id",
            pk_column: "id",
        },
        ObjectKind::BriefResponses => KindLookup {
            table: "brief_responses",
            external_id_column: "id",
            pk_column: "id",
        },
    }
}

/// Resolves an external identifier to the internal primary key, or
/// `None` when no row of that kind matches. External ids are compared
/// as text since their column types differ across kinds.
pub async fn resolve_external_id(
    pool: &PgPool,
    kind: ObjectKind,
    external_id: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let spec = lookup(kind);
    let sql = format!(
        "SELECT {pk} FROM {table} WHERE {ext}::text = $1",
        pk = spec.pk_column,
        table = spec.table,
        ext = spec.external_id_column,
    );
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(external_id)
        .fetch_optional(pool)
        .await
}

/// Service row slice used by the cascading acknowledgement: internal
/// pk, external id and the owning supplier's internal pk.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceOwnership {
    pub id: ServiceId,
    pub service_id: i64,
    pub supplier_id: SupplierId,
}

pub async fn find_service_by_external_id(
    pool: &PgPool,
    external_id: i64,
) -> Result<Option<ServiceOwnership>, sqlx::Error> {
    sqlx::query_as::<_, ServiceOwnership>(
        "SELECT id, service_id, supplier_id FROM services WHERE service_id = $1",
    )
    .bind(external_id)
    .fetch_optional(pool)
    .await
}
