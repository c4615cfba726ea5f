//! Data access for the audit event table.
//!
//! Every dynamic listing query goes through one `QueryBuilder` so the
//! WHERE clauses stay in a single place. The cascade helpers run inside
//! a caller-owned transaction: the merged streams are locked with
//! `FOR UPDATE` before the batch update so two concurrent cascades on
//! the same entity cannot interleave.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::{AuditEvent, AuditEventType, ObjectKind};
use crate::services::audit_query::AuditQuery;
use crate::types::{AuditEventId, ServiceId, SupplierId};

// `user` collides with a SQL keyword, so the column is always quoted.
const COLUMNS: &str = "id, type, created_at, \"user\", data, object_type, object_id, \
     acknowledged, acknowledged_at, acknowledged_by";

/// Fields supplied by a collaborator recording a new event. The object
/// reference carries the *internal* primary key; external ids must be
/// resolved before this point.
#[derive(Debug, Clone)]
pub struct NewAuditEvent<'a> {
    pub event_type: AuditEventType,
    pub created_at: DateTime<Utc>,
    pub user: Option<&'a str>,
    pub data: &'a Value,
    pub object: Option<(ObjectKind, i64)>,
}

pub async fn insert_audit_event(
    pool: &PgPool,
    new: &NewAuditEvent<'_>,
) -> Result<AuditEvent, sqlx::Error> {
    let sql = format!(
        "INSERT INTO audit_events (type, created_at, \"user\", data, object_type, object_id, acknowledged) \
         VALUES ($1, $2, $3, $4, $5, $6, FALSE) RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, AuditEvent>(&sql)
        .bind(new.event_type)
        .bind(new.created_at)
        .bind(new.user)
        .bind(new.data)
        .bind(new.object.map(|(kind, _)| kind))
        .bind(new.object.map(|(_, id)| id))
        .fetch_one(pool)
        .await
}

pub async fn fetch_audit_event(
    pool: &PgPool,
    id: AuditEventId,
) -> Result<Option<AuditEvent>, sqlx::Error> {
    let sql = format!("SELECT {COLUMNS} FROM audit_events WHERE id = $1");
    sqlx::query_as::<_, AuditEvent>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Fetches the stream matching the predicates of a compiled query, in
/// canonical `(created_at, id)` order. Payload ids are compared as text
/// against the decimal rendering of the queried id, which is what the
/// expression indexes on `data` cover. Collapsing and pagination are
/// applied by the query engine on top of this.
pub async fn fetch_filtered(
    pool: &PgPool,
    query: &AuditQuery,
    resolved_object: Option<(ObjectKind, i64)>,
) -> Result<Vec<AuditEvent>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {COLUMNS} FROM audit_events"));
    let mut has_clause = false;

    if let Some(event_type) = query.audit_type {
        push_clause(&mut builder, &mut has_clause);
        builder.push("type = ").push_bind(event_type);
    }
    if let Some(user) = query.user.as_deref() {
        push_clause(&mut builder, &mut has_clause);
        builder.push("\"user\" = ").push_bind(user.to_owned());
    }
    if let Some(acknowledged) = query.acknowledged {
        push_clause(&mut builder, &mut has_clause);
        builder.push("acknowledged = ").push_bind(acknowledged);
    }
    if let Some(range) = query.created_range {
        if let Some(from) = range.from {
            push_clause(&mut builder, &mut has_clause);
            builder.push("created_at >= ").push_bind(from);
        }
        if let Some(until) = range.until {
            push_clause(&mut builder, &mut has_clause);
            builder.push("created_at < ").push_bind(until);
        }
    }
    if let Some(supplier_id) = query.data_supplier_id {
        push_clause(&mut builder, &mut has_clause);
        builder
            .push("COALESCE(data ->> 'supplierId', data ->> 'supplier_id') = ")
            .push_bind(supplier_id.to_string());
    }
    if let Some(draft_id) = query.data_draft_service_id {
        push_clause(&mut builder, &mut has_clause);
        builder
            .push("COALESCE(data ->> 'draftId', data ->> 'draft_id') = ")
            .push_bind(draft_id.to_string());
    }
    if let Some((kind, object_id)) = resolved_object {
        push_clause(&mut builder, &mut has_clause);
        builder.push("object_type = ").push_bind(kind);
        builder.push(" AND object_id = ").push_bind(object_id);
    }

    builder.push(" ORDER BY created_at, id");
    builder.build_query_as::<AuditEvent>().fetch_all(pool).await
}

/// Acknowledges one event; returns `None` when the row is absent or was
/// already acknowledged, leaving earlier stamps untouched either way.
pub async fn acknowledge_audit_event(
    pool: &PgPool,
    id: AuditEventId,
    acknowledged_at: DateTime<Utc>,
    acknowledged_by: &str,
) -> Result<Option<AuditEvent>, sqlx::Error> {
    let sql = format!(
        "UPDATE audit_events \
         SET acknowledged = TRUE, acknowledged_at = $2, acknowledged_by = $3 \
         WHERE id = $1 AND acknowledged = FALSE RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, AuditEvent>(&sql)
        .bind(id)
        .bind(acknowledged_at)
        .bind(acknowledged_by)
        .fetch_optional(pool)
        .await
}

/// Locks and returns the merged candidate streams for a cascading
/// acknowledgement: the service's own `update_service` history and the
/// owning supplier's `supplier_update` history, in canonical order.
pub async fn lock_cascade_streams(
    tx: &mut sqlx::PgTransaction<'_>,
    service_pk: ServiceId,
    supplier_pk: SupplierId,
) -> Result<Vec<AuditEvent>, sqlx::Error> {
    let sql = format!(
        "SELECT {COLUMNS} FROM audit_events \
         WHERE (type = $1 AND object_type = $2 AND object_id = $3) \
            OR (type = $4 AND object_type = $5 AND object_id = $6) \
         ORDER BY created_at, id \
         FOR UPDATE"
    );
    sqlx::query_as::<_, AuditEvent>(&sql)
        .bind(AuditEventType::UpdateService)
        .bind(ObjectKind::Services)
        .bind(service_pk.get())
        .bind(AuditEventType::SupplierUpdate)
        .bind(ObjectKind::Suppliers)
        .bind(supplier_pk.get())
        .fetch_all(&mut **tx)
        .await
}

/// Transitions a batch of events in one statement, sharing a single
/// timestamp and actor. Rows already acknowledged keep their original
/// stamp and are never rewritten.
pub async fn acknowledge_batch(
    tx: &mut sqlx::PgTransaction<'_>,
    ids: &[AuditEventId],
    acknowledged_at: DateTime<Utc>,
    acknowledged_by: &str,
) -> Result<Vec<AuditEvent>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let raw_ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
    let sql = format!(
        "UPDATE audit_events \
         SET acknowledged = TRUE, acknowledged_at = $2, acknowledged_by = $3 \
         WHERE id = ANY($1) AND acknowledged = FALSE RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, AuditEvent>(&sql)
        .bind(&raw_ids)
        .bind(acknowledged_at)
        .bind(acknowledged_by)
        .fetch_all(&mut **tx)
        .await
}

fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, has_clause: &mut bool) {
    if *has_clause {
        builder.push(" AND ");
    } else {
        builder.push(" WHERE ");
        *has_clause = true;
    }
}
