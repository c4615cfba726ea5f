//! HTTP surface of the audit trail.
//!
//! Every payload travels inside an `auditEvents` envelope, matching the
//! wire conventions of the surrounding marketplace API. Acknowledgement
//! payloads carry the actor as `updated_by`, either at the top level or
//! nested under `update_details` for older clients.

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::models::AuditEvent;
use crate::services::audit_query::AuditQueryParams;
use crate::services::audit_trail::{self, RecordEventRequest};
use crate::state::AppState;
use crate::types::AuditEventId;
use crate::utils::pagination::PageLinks;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/audit-events",
            get(list_audit_events).post(create_audit_event),
        )
        .route("/audit-events/{id}", get(get_audit_event))
        .route(
            "/audit-events/{id}/acknowledge",
            post(acknowledge_audit_event),
        )
        .route(
            "/services/{service_id}/updates/acknowledge",
            post(acknowledge_service_updates),
        )
}

/// An event as it leaves the API: the stored fields plus a `links`
/// object pointing back at the event's own url.
#[derive(Debug, Serialize)]
pub struct AuditEventView {
    #[serde(flatten)]
    pub event: AuditEvent,
    pub links: EventLinks,
}

#[derive(Debug, Serialize)]
pub struct EventLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

impl From<AuditEvent> for AuditEventView {
    fn from(event: AuditEvent) -> Self {
        let self_link = format!("/audit-events/{}", event.id);
        Self {
            event,
            links: EventLinks { self_link },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventListResponse {
    pub audit_events: Vec<AuditEventView>,
    pub links: PageLinks,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventResponse {
    pub audit_events: AuditEventView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgedEventsResponse {
    pub audit_events: Vec<AuditEventView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuditEventBody {
    pub audit_events: CreateAuditEventPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuditEventPayload {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub user: Option<String>,
    pub data: Option<Value>,
    pub object_type: Option<String>,
    pub object_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatedByBody {
    pub updated_by: Option<String>,
    pub update_details: Option<UpdateDetails>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDetails {
    pub updated_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeServiceUpdatesBody {
    pub latest_audit_event_id: Option<Value>,
    #[serde(rename = "updated_by")]
    pub updated_by: Option<String>,
    #[serde(rename = "update_details")]
    pub update_details: Option<UpdateDetails>,
}

pub async fn list_audit_events(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<AuditEventListResponse>, AppError> {
    let page = audit_trail::list_audit_events(
        &state,
        &params,
        "/audit-events",
        raw_query.as_deref().unwrap_or(""),
    )
    .await?;
    Ok(Json(AuditEventListResponse {
        audit_events: page.events.into_iter().map(AuditEventView::from).collect(),
        links: page.links,
    }))
}

pub async fn get_audit_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AuditEventResponse>, AppError> {
    let event = audit_trail::get_audit_event(&state, AuditEventId::new(id)).await?;
    Ok(Json(AuditEventResponse {
        audit_events: event.into(),
    }))
}

pub async fn create_audit_event(
    State(state): State<AppState>,
    Json(body): Json<CreateAuditEventBody>,
) -> Result<(StatusCode, Json<AuditEventResponse>), AppError> {
    let payload = body.audit_events;
    let event_type = payload
        .event_type
        .ok_or_else(|| AppError::BadRequest("'type' is a required field".to_string()))?;
    let data = payload
        .data
        .ok_or_else(|| AppError::BadRequest("'data' is a required field".to_string()))?;

    let event = audit_trail::record_audit_event(
        &state,
        RecordEventRequest {
            event_type,
            user: payload.user,
            data,
            object_type: payload.object_type,
            object_id: object_id_string(payload.object_id)?,
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuditEventResponse {
            audit_events: event.into(),
        }),
    ))
}

pub async fn acknowledge_audit_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdatedByBody>,
) -> Result<Json<AuditEventResponse>, AppError> {
    let actor = updated_by(body.updated_by.as_deref(), body.update_details.as_ref())?;
    let event =
        audit_trail::acknowledge_audit_event(&state, AuditEventId::new(id), actor).await?;
    Ok(Json(AuditEventResponse {
        audit_events: event.into(),
    }))
}

pub async fn acknowledge_service_updates(
    State(state): State<AppState>,
    Path(service_id): Path<i64>,
    Json(body): Json<AcknowledgeServiceUpdatesBody>,
) -> Result<Json<AcknowledgedEventsResponse>, AppError> {
    let actor = updated_by(body.updated_by.as_deref(), body.update_details.as_ref())?;
    let latest_event_id = latest_event_id(body.latest_audit_event_id.as_ref())?;
    let events =
        audit_trail::acknowledge_service_updates(&state, service_id, latest_event_id, actor)
            .await?;
    Ok(Json(AcknowledgedEventsResponse {
        audit_events: events.into_iter().map(AuditEventView::from).collect(),
    }))
}

/// The actor field, read from the top level or from the legacy
/// `update_details` nesting.
fn updated_by<'a>(
    top_level: Option<&'a str>,
    details: Option<&'a UpdateDetails>,
) -> Result<&'a str, AppError> {
    top_level
        .or_else(|| details.and_then(|d| d.updated_by.as_deref()))
        .ok_or_else(|| AppError::BadRequest("'updated_by' is a required field".to_string()))
}

/// External object ids arrive as JSON numbers or strings depending on
/// the client; both normalize to the string form used for lookups.
fn object_id_string(value: Option<Value>) -> Result<Option<String>, AppError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(AppError::BadRequest(
            "invalid object ID supplied".to_string(),
        )),
    }
}

fn latest_event_id(value: Option<&Value>) -> Result<AuditEventId, AppError> {
    let raw = value.ok_or_else(|| {
        AppError::BadRequest("'latestAuditEventId' is a required field".to_string())
    })?;
    let id = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::BadRequest("invalid latestAuditEventId supplied".to_string()))?;
    Ok(AuditEventId::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn updated_by_prefers_the_top_level_field() {
        let details = UpdateDetails {
            updated_by: Some("nested@example.com".to_string()),
        };
        assert_eq!(
            updated_by(Some("top@example.com"), Some(&details)).unwrap(),
            "top@example.com"
        );
        assert_eq!(updated_by(None, Some(&details)).unwrap(), "nested@example.com");
        assert!(matches!(
            updated_by(None, None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn object_id_accepts_numbers_and_strings() {
        assert_eq!(
            object_id_string(Some(json!(42))).unwrap().as_deref(),
            Some("42")
        );
        assert_eq!(
            object_id_string(Some(json!("abc-1"))).unwrap().as_deref(),
            Some("abc-1")
        );
        assert_eq!(object_id_string(None).unwrap(), None);
        assert_eq!(object_id_string(Some(Value::Null)).unwrap(), None);
        assert!(object_id_string(Some(json!(["no"]))).is_err());
    }

    #[test]
    fn latest_event_id_normalizes_numeric_strings() {
        assert_eq!(
            latest_event_id(Some(&json!(7))).unwrap(),
            AuditEventId::new(7)
        );
        assert_eq!(
            latest_event_id(Some(&json!(" 7 "))).unwrap(),
            AuditEventId::new(7)
        );
        assert!(latest_event_id(None).is_err());
        assert!(latest_event_id(Some(&json!("seven"))).is_err());
        assert!(latest_event_id(Some(&json!(null))).is_err());
    }

    #[test]
    fn event_view_flattens_the_event_and_adds_a_self_link() {
        use crate::models::{AuditEventType, ObjectKind};
        use chrono::{TimeZone, Utc};

        let event = AuditEvent {
            id: AuditEventId::new(12),
            event_type: AuditEventType::UpdateService,
            created_at: Utc.timestamp_opt(3600, 0).unwrap(),
            user: Some("joe@example.com".to_string()),
            data: json!({"supplierId": 3}),
            object_type: Some(ObjectKind::Services),
            object_id: Some(4),
            acknowledged: false,
            acknowledged_at: None,
            acknowledged_by: None,
        };
        let value = serde_json::to_value(AuditEventView::from(event)).unwrap();
        assert_eq!(value["id"], 12);
        assert_eq!(value["type"], "update_service");
        assert_eq!(value["objectType"], "services");
        assert_eq!(value["links"]["self"], "/audit-events/12");
    }

    #[test]
    fn create_body_reads_the_envelope() {
        let body: CreateAuditEventBody = serde_json::from_value(json!({
            "auditEvents": {
                "type": "update_service",
                "user": "joe@example.com",
                "data": {"supplierId": 3},
                "objectType": "services",
                "objectId": 7
            }
        }))
        .unwrap();
        assert_eq!(body.audit_events.event_type.as_deref(), Some("update_service"));
        assert_eq!(body.audit_events.object_type.as_deref(), Some("services"));
    }
}
