//! Query engine and acknowledgement engine for the audit trail.
//!
//! The listing pipeline is: filtered stream -> payload predicates ->
//! earliest-per-object collapse -> canonical sort -> pagination. The
//! collapse runs strictly after every predicate; collapsing first would
//! pick a different representative per group.
//!
//! Acknowledgement is a one-way transition per event. The cascading
//! variant merges two chronological streams (the service's own updates
//! and its owning supplier's updates), cuts them at a chosen event and
//! flips everything unacknowledged at or before the cut in one
//! transaction.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde_json::Value;

use crate::error::AppError;
use crate::models::{AuditEvent, AuditEventType, ObjectKind};
use crate::repositories::{audit_event, object_lookup, transaction};
use crate::services::audit_query::{self, AuditQuery, AuditQueryParams};
use crate::state::AppState;
use crate::types::{AuditEventId, ServiceId};
use crate::utils::pagination::{self, PageLinks};

/// One page of query results plus the derived pagination metadata.
#[derive(Debug, Clone)]
pub struct AuditEventPage {
    pub events: Vec<AuditEvent>,
    pub total: usize,
    pub page: i64,
    pub per_page: i64,
    pub links: PageLinks,
}

/// Fields a collaborator supplies when recording a new event. The
/// object reference is still external at this point.
#[derive(Debug, Clone)]
pub struct RecordEventRequest {
    pub event_type: String,
    pub user: Option<String>,
    pub data: Value,
    pub object_type: Option<String>,
    pub object_id: Option<String>,
}

// === Query engine ===

pub async fn list_audit_events(
    state: &AppState,
    params: &AuditQueryParams,
    request_path: &str,
    raw_query: &str,
) -> Result<AuditEventPage, AppError> {
    let query = audit_query::compile(params, state.config.default_page_size)?;

    let resolved_object = match &query.object {
        Some((kind, external_id)) => {
            let pk = object_lookup::resolve_external_id(state.read_pool(), *kind, external_id)
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| {
                    AppError::NotFound(
                        "Object with given object-type and object-id doesn't exist".to_string(),
                    )
                })?;
            Some((*kind, pk))
        }
        None => None,
    };

    if query.earliest_for_each_object && !is_collapse_indexed_scope(&query) {
        tracing::warn!(
            "earliest_for_each_object option currently intended for use on unacknowledged \
             update_service events; other uses are not covered by the partial index"
        );
    }

    let events = audit_event::fetch_filtered(state.read_pool(), &query, resolved_object)
        .await
        .map_err(AppError::from)?;

    execute(events, &query, resolved_object, request_path, raw_query)
}

pub async fn get_audit_event(
    state: &AppState,
    id: AuditEventId,
) -> Result<AuditEvent, AppError> {
    audit_event::fetch_audit_event(state.read_pool(), id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound("No audit event with this id".to_string()))
}

/// The scope the unacknowledged partial index was sized for.
fn is_collapse_indexed_scope(query: &AuditQuery) -> bool {
    query.acknowledged == Some(false)
        && query.audit_type == Some(AuditEventType::UpdateService)
        && matches!(query.object, Some((ObjectKind::Services, _)))
}

/// Runs the compiled specification over a stream of events. Pure: the
/// stream is whatever the store handed back, and every predicate is
/// (re-)checked here, so the function is the single source of truth for
/// membership.
pub(crate) fn execute(
    events: Vec<AuditEvent>,
    query: &AuditQuery,
    resolved_object: Option<(ObjectKind, i64)>,
    request_path: &str,
    raw_query: &str,
) -> Result<AuditEventPage, AppError> {
    let mut events: Vec<AuditEvent> = events
        .into_iter()
        .filter(|event| matches(event, query, resolved_object))
        .collect();

    if query.earliest_for_each_object {
        events = collapse_earliest_per_object(events);
    }

    events.sort_by(|a, b| {
        let ordering = a.canonical_cmp(b);
        if query.latest_first {
            ordering.reverse()
        } else {
            ordering
        }
    });

    let total = events.len();
    let (start, end) = page_bounds(total, query.page, query.per_page)?;
    let links = pagination::build_links(
        request_path,
        raw_query,
        query.page,
        pagination::total_pages(total, query.per_page),
    );

    Ok(AuditEventPage {
        events: events.drain(start..end).collect(),
        total,
        page: query.page,
        per_page: query.per_page,
        links,
    })
}

/// All predicates of a compiled query against one event.
pub(crate) fn matches(
    event: &AuditEvent,
    query: &AuditQuery,
    resolved_object: Option<(ObjectKind, i64)>,
) -> bool {
    if let Some(event_type) = query.audit_type {
        if event.event_type != event_type {
            return false;
        }
    }
    if let Some(user) = query.user.as_deref() {
        if event.user.as_deref() != Some(user) {
            return false;
        }
    }
    if let Some(acknowledged) = query.acknowledged {
        if event.acknowledged != acknowledged {
            return false;
        }
    }
    if let Some(range) = query.created_range {
        if !range.contains(event.created_at) {
            return false;
        }
    }
    if let Some(supplier_id) = query.data_supplier_id {
        if event.data_supplier_id() != Some(supplier_id) {
            return false;
        }
    }
    if let Some(draft_id) = query.data_draft_service_id {
        if event.data_draft_service_id() != Some(draft_id) {
            return false;
        }
    }
    if let Some(object) = resolved_object {
        if event.object_ref() != Some(object) {
            return false;
        }
    }
    true
}

/// Keeps the canonical-order minimum per `(object_type, object_id)`
/// group. Events without an object reference are each their own group
/// and survive untouched.
pub(crate) fn collapse_earliest_per_object(events: Vec<AuditEvent>) -> Vec<AuditEvent> {
    let mut winners: HashMap<(ObjectKind, i64), AuditEvent> = HashMap::new();
    let mut unreferenced = Vec::new();

    for event in events {
        match event.object_ref() {
            Some(key) => match winners.entry(key) {
                Entry::Occupied(mut slot) => {
                    if event.canonical_cmp(slot.get()) == Ordering::Less {
                        slot.insert(event);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(event);
                }
            },
            None => unreferenced.push(event),
        }
    }

    unreferenced.extend(winners.into_values());
    unreferenced
}

/// Slice bounds for the requested page. The first page is always
/// addressable, even over an empty result set; any later page must
/// actually contain rows.
fn page_bounds(total: usize, page: i64, per_page: i64) -> Result<(usize, usize), AppError> {
    let start = (page - 1)
        .checked_mul(per_page)
        .filter(|start| *start >= 0)
        .ok_or_else(|| AppError::NotFound("Page number out of range".to_string()))?;

    if page > 1 && start as u128 >= total as u128 {
        return Err(AppError::NotFound("Page number out of range".to_string()));
    }

    let start = (start as usize).min(total);
    let end = start.saturating_add(per_page as usize).min(total);
    Ok((start, end))
}

// === Acknowledgement engine ===

pub async fn record_audit_event(
    state: &AppState,
    request: RecordEventRequest,
) -> Result<AuditEvent, AppError> {
    let event_type: AuditEventType = request
        .event_type
        .parse()
        .map_err(|e: crate::models::UnknownAuditType| AppError::BadRequest(e.to_string()))?;

    let object = match (request.object_type, request.object_id) {
        (None, None) => None,
        (None, Some(_)) => {
            return Err(AppError::BadRequest(
                "object ID cannot be provided without an object type".to_string(),
            ))
        }
        (Some(_), None) => {
            return Err(AppError::BadRequest(
                "object type cannot be provided without an object ID".to_string(),
            ))
        }
        (Some(kind), Some(external_id)) => {
            let kind: ObjectKind = kind
                .parse()
                .map_err(|e: crate::models::UnknownObjectKind| AppError::BadRequest(e.to_string()))?;
            let pk = object_lookup::resolve_external_id(&state.write_pool, kind, &external_id)
                .await
                .map_err(AppError::from)?
                .ok_or_else(|| {
                    AppError::BadRequest("referenced object does not exist".to_string())
                })?;
            Some((kind, pk))
        }
    };

    let new = audit_event::NewAuditEvent {
        event_type,
        created_at: state.clock.now(),
        user: request.user.as_deref(),
        data: &request.data,
        object,
    };
    let event = audit_event::insert_audit_event(&state.write_pool, &new)
        .await
        .map_err(AppError::from)?;

    tracing::debug!(event_id = %event.id, event_type = %event.event_type, "recorded audit event");
    Ok(event)
}

/// Acknowledges a single event. Re-acknowledging an already
/// acknowledged event is a no-op that returns the stored row with its
/// original stamp.
pub async fn acknowledge_audit_event(
    state: &AppState,
    id: AuditEventId,
    actor: &str,
) -> Result<AuditEvent, AppError> {
    require_actor(actor)?;

    let event = audit_event::fetch_audit_event(&state.write_pool, id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound("No audit event with this id".to_string()))?;

    if event.acknowledged {
        return Ok(event);
    }

    match audit_event::acknowledge_audit_event(&state.write_pool, id, state.clock.now(), actor)
        .await
        .map_err(AppError::from)?
    {
        Some(updated) => Ok(updated),
        // a concurrent request acknowledged it between the read and the
        // update; the stored stamp wins
        None => audit_event::fetch_audit_event(&state.write_pool, id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::NotFound("No audit event with this id".to_string())),
    }
}

/// Cascading acknowledgement: clears the backlog of a service's own
/// update events and its owning supplier's update events, up to and
/// including `latest_event_id`, in one atomic batch. Returns exactly
/// the events that changed state.
pub async fn acknowledge_service_updates(
    state: &AppState,
    service_external_id: i64,
    latest_event_id: AuditEventId,
    actor: &str,
) -> Result<Vec<AuditEvent>, AppError> {
    require_actor(actor)?;

    let service = object_lookup::find_service_by_external_id(&state.write_pool, service_external_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::NotFound("Service not found".to_string()))?;

    let mut tx = transaction::begin_transaction(&state.write_pool).await?;

    let stream = audit_event::lock_cascade_streams(&mut tx, service.id, service.supplier_id)
        .await
        .map_err(AppError::from)?;

    // dropping the transaction on this error path rolls everything back
    let candidates = cascade_candidates(&stream, latest_event_id, service.id).ok_or_else(|| {
        AppError::NotFound("No suitable audit event with this id".to_string())
    })?;

    let mut changed =
        audit_event::acknowledge_batch(&mut tx, &candidates, state.clock.now(), actor)
            .await
            .map_err(AppError::from)?;
    transaction::commit_transaction(tx).await?;

    changed.sort_by(|a, b| a.canonical_cmp(b));
    tracing::info!(
        service_id = service_external_id,
        latest_event_id = %latest_event_id,
        count = changed.len(),
        "acknowledged service update events"
    );
    Ok(changed)
}

/// Selects the ids to transition for a cascading acknowledgement.
///
/// `stream` must be the merged candidate streams in canonical ascending
/// order. Returns `None` when the cut-off event is not in the stream,
/// is not an `update_service` event, or does not belong to this
/// service; the caller reports all of those as not-found. Otherwise
/// returns the ids of every still-unacknowledged event at or before the
/// cut-off position.
pub(crate) fn cascade_candidates(
    stream: &[AuditEvent],
    latest_event_id: AuditEventId,
    service_pk: ServiceId,
) -> Option<Vec<AuditEventId>> {
    let position = stream.iter().position(|event| event.id == latest_event_id)?;
    let cutoff = &stream[position];

    if cutoff.event_type != AuditEventType::UpdateService
        || cutoff.object_ref() != Some((ObjectKind::Services, service_pk.get()))
    {
        return None;
    }

    Some(
        stream[..=position]
            .iter()
            .filter(|event| !event.acknowledged)
            .map(|event| event.id)
            .collect(),
    )
}

fn require_actor(actor: &str) -> Result<(), AppError> {
    if actor.trim().is_empty() {
        return Err(AppError::BadRequest(
            "'updated_by' must not be empty".to_string(),
        ));
    }
    Ok(())
}
