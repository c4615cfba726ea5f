//! Filter compiler for audit event listings.
//!
//! Turns the bag of string-valued query parameters into a typed
//! [`AuditQuery`]. Compilation is pure: nothing here touches the
//! database, so every rule is unit-testable in isolation. Resolution of
//! the `object-type`/`object-id` pair against real rows happens later,
//! in the query engine.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::{AuditEventType, ObjectKind};

/// Raw query parameters as they arrive on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQueryParams {
    #[serde(rename = "audit-type")]
    pub audit_type: Option<String>,
    #[serde(rename = "object-type")]
    pub object_type: Option<String>,
    #[serde(rename = "object-id")]
    pub object_id: Option<String>,
    pub user: Option<String>,
    pub acknowledged: Option<String>,
    #[serde(rename = "audit-date")]
    pub audit_date: Option<String>,
    #[serde(rename = "data-supplier-id")]
    pub data_supplier_id: Option<String>,
    #[serde(rename = "data-draft-service-id")]
    pub data_draft_service_id: Option<String>,
    pub earliest_for_each_object: Option<String>,
    pub latest_first: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

/// Half-open `[from, until)` interval over `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedRange {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl CreatedRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| ts >= from) && self.until.map_or(true, |until| ts < until)
    }
}

/// Compiled query specification.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditQuery {
    pub audit_type: Option<AuditEventType>,
    pub user: Option<String>,
    /// `None` lists both acknowledged and unacknowledged events.
    pub acknowledged: Option<bool>,
    pub created_range: Option<CreatedRange>,
    pub data_supplier_id: Option<i64>,
    pub data_draft_service_id: Option<i64>,
    /// Kind plus the *external* identifier, still unresolved.
    pub object: Option<(ObjectKind, String)>,
    pub earliest_for_each_object: bool,
    pub latest_first: bool,
    pub page: i64,
    pub per_page: i64,
}

pub fn compile(params: &AuditQueryParams, default_page_size: i64) -> Result<AuditQuery, AppError> {
    let audit_type = match normalize(params.audit_type.as_ref()) {
        Some(raw) => Some(
            raw.parse::<AuditEventType>()
                .map_err(|e| AppError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };

    let object = compile_object_filter(
        normalize(params.object_type.as_ref()),
        normalize(params.object_id.as_ref()),
    )?;

    let user = normalize(params.user.as_ref()).map(|s| s.to_string());

    let acknowledged = match normalize(params.acknowledged.as_ref()) {
        None | Some("all") => None,
        Some("true") => Some(true),
        Some("false") => Some(false),
        Some(_) => {
            return Err(AppError::BadRequest(
                "invalid acknowledged state supplied".to_string(),
            ))
        }
    };

    let created_range = match normalize(params.audit_date.as_ref()) {
        Some(raw) => Some(compile_date_filter(raw)?),
        None => None,
    };

    let data_supplier_id = compile_numeric(normalize(params.data_supplier_id.as_ref()), "data-supplier-id")?;
    let data_draft_service_id = compile_numeric(
        normalize(params.data_draft_service_id.as_ref()),
        "data-draft-service-id",
    )?;

    let earliest_for_each_object = boolean_flag(normalize(params.earliest_for_each_object.as_ref()));
    let latest_first = boolean_flag(normalize(params.latest_first.as_ref()));

    let page = match normalize(params.page.as_ref()) {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| AppError::BadRequest("Invalid page argument".to_string()))?,
        None => 1,
    };

    let per_page = match normalize(params.per_page.as_ref()) {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| AppError::BadRequest("invalid page size supplied".to_string()))?,
        None => default_page_size,
    };

    Ok(AuditQuery {
        audit_type,
        user,
        acknowledged,
        created_range,
        data_supplier_id,
        data_draft_service_id,
        object,
        earliest_for_each_object,
        latest_first,
        page,
        per_page,
    })
}

fn compile_object_filter(
    object_type: Option<&str>,
    object_id: Option<&str>,
) -> Result<Option<(ObjectKind, String)>, AppError> {
    match (object_type, object_id) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(AppError::BadRequest(
            "object-id cannot be provided without object-type".to_string(),
        )),
        (Some(_), None) => Err(AppError::BadRequest(
            "object-type cannot be provided without object-id".to_string(),
        )),
        (Some(kind), Some(id)) => {
            let kind = kind
                .parse::<ObjectKind>()
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            Ok(Some((kind, id.to_string())))
        }
    }
}

/// `audit-date` grammar: a single `YYYY-MM-DD` day, an open-ended
/// comparison (`<=D`, `>=D`, `<D`, `>D`) or an inclusive `D1..D2` range.
fn compile_date_filter(raw: &str) -> Result<CreatedRange, AppError> {
    if let Some(rest) = raw.strip_prefix("<=") {
        return Ok(CreatedRange {
            from: None,
            until: Some(day_start(parse_date(rest)?) + Duration::days(1)),
        });
    }
    if let Some(rest) = raw.strip_prefix(">=") {
        return Ok(CreatedRange {
            from: Some(day_start(parse_date(rest)?)),
            until: None,
        });
    }
    if let Some(rest) = raw.strip_prefix('<') {
        return Ok(CreatedRange {
            from: None,
            until: Some(day_start(parse_date(rest)?)),
        });
    }
    if let Some(rest) = raw.strip_prefix('>') {
        return Ok(CreatedRange {
            from: Some(day_start(parse_date(rest)?) + Duration::days(1)),
            until: None,
        });
    }
    if let Some((start, end)) = raw.split_once("..") {
        let (start, end) = (parse_date(start)?, parse_date(end)?);
        return Ok(CreatedRange {
            from: Some(day_start(start)),
            until: Some(day_start(end) + Duration::days(1)),
        });
    }

    let day = parse_date(raw)?;
    Ok(CreatedRange {
        from: Some(day_start(day)),
        until: Some(day_start(day) + Duration::days(1)),
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest("invalid audit date supplied".to_string()))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}

fn compile_numeric(raw: Option<&str>, name: &str) -> Result<Option<i64>, AppError> {
    match raw {
        None => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid {}: {}", name, value))),
    }
}

/// Trims a parameter; explicitly empty values mean "filter absent".
fn normalize(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn boolean_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.to_ascii_lowercase()).as_deref(),
        Some("true") | Some("t") | Some("yes") | Some("y") | Some("1")
    )
}
