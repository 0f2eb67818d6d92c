use crate::error::{BackendError, ChecklistError, MenuError};
use crate::models::{
    AggregatedRows, ChecklistRequest, ChecklistView, EntryMove, MenuEntry, QuantityMode,
};
use crate::service::{print_tables, write_csv, ChecklistService, MenuRepository};
use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response body for checklist generation
#[derive(Debug, Serialize)]
pub struct ChecklistResponse {
    pub success: bool,
    pub message: String,
    pub generation: Option<u64>,
    pub view: Option<ChecklistView>,
    pub quantity_mode: Option<QuantityMode>,
    pub rows: Option<AggregatedRows>,
    pub warnings: Vec<String>,
}

/// Generic response body for menu operations
#[derive(Debug, Serialize)]
pub struct MenuResponse {
    pub success: bool,
    pub message: String,
    pub count: Option<usize>,
    /// How many of `entries` are actually served on the date
    pub served: Option<usize>,
    pub entries: Option<Vec<MenuEntry>>,
}

/// Identifies one `(site, date)` menu snapshot
#[derive(Debug, Deserialize)]
pub struct MenuDateRequest {
    pub site_id: String,
    pub service_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct UpsertEntryRequest {
    pub site_id: String,
    pub service_date: NaiveDate,
    pub entry: MenuEntry,
}

#[derive(Debug, Deserialize)]
pub struct MoveEntryRequest {
    pub site_id: String,
    pub service_date: NaiveDate,
    #[serde(flatten)]
    pub movement: EntryMove,
}

#[derive(Debug, Deserialize)]
pub struct RemoveEntryRequest {
    pub site_id: String,
    pub service_date: NaiveDate,
    pub space_key: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetSiteRequest {
    pub site_id: String,
}

/// Health check
pub async fn health_check() -> &'static str {
    "OK"
}

fn status_for(err: &ChecklistError) -> StatusCode {
    match err {
        ChecklistError::Validation(_) => StatusCode::BAD_REQUEST,
        ChecklistError::DayFetch { .. } => StatusCode::BAD_GATEWAY,
        ChecklistError::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ChecklistError::StaleMenu { .. } | ChecklistError::Superseded { .. } => StatusCode::CONFLICT,
    }
}

fn checklist_error(err: ChecklistError) -> Response {
    let response = ChecklistResponse {
        success: false,
        message: format!("Error: {}", err),
        generation: None,
        view: None,
        quantity_mode: None,
        rows: None,
        warnings: Vec::new(),
    };
    (status_for(&err), Json(response)).into_response()
}

fn menu_error(err: MenuError) -> Response {
    let status = match &err {
        MenuError::NotLoaded { .. } => StatusCode::CONFLICT,
        MenuError::Backend(BackendError::Rejected { status, .. }) if *status == 400 || *status == 404 => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        MenuError::Backend(BackendError::Rejected { .. } | BackendError::InvalidResponse(_)) => {
            StatusCode::BAD_GATEWAY
        }
        MenuError::Backend(BackendError::Connection(_) | BackendError::Timeout { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    let response = MenuResponse {
        success: false,
        message: format!("Error: {}", err),
        count: None,
        served: None,
        entries: None,
    };
    (status, Json(response)).into_response()
}

/// Current local entries of `(site, date)` with their served count
fn menu_ok(menus: &MenuRepository, site_id: &str, date: NaiveDate, message: String) -> Response {
    let entries = menus.entries(site_id, date);
    let response = MenuResponse {
        success: true,
        message,
        count: Some(entries.len()),
        served: Some(menus.entries_served_on(site_id, date).len()),
        entries: Some(entries),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Generate a checklist over a date range
pub async fn generate_checklist(
    State(service): State<Arc<ChecklistService>>,
    Json(req): Json<ChecklistRequest>,
) -> Response {
    match service.generate(&req).await {
        Ok(report) => {
            let response = ChecklistResponse {
                success: true,
                message: format!(
                    "Checklist for {} from {} to {}: {} rows",
                    report.site_id,
                    report.start_date,
                    report.end_date,
                    report.rows.len()
                ),
                generation: Some(report.generation),
                view: Some(report.view),
                quantity_mode: Some(report.quantity_mode),
                rows: Some(report.rows),
                warnings: report.warnings,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => checklist_error(e),
    }
}

/// Generate a checklist and return its printable tables as CSV
pub async fn export_checklist(
    State(service): State<Arc<ChecklistService>>,
    Json(req): Json<ChecklistRequest>,
) -> Response {
    let report = match service.generate(&req).await {
        Ok(report) => report,
        Err(e) => return checklist_error(e),
    };

    let tables = print_tables(&report.rows, report.quantity_mode);
    let mut body = Vec::new();
    if let Err(e) = write_csv(&tables, &mut body) {
        tracing::error!("CSV export failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response();
    }

    let disposition = format!(
        "attachment; filename=\"checklist-{}-{}-{}.csv\"",
        report.site_id, report.start_date, report.end_date
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// Supersede in-flight runs and drop local menu state for a site
pub async fn reset_site(
    State(service): State<Arc<ChecklistService>>,
    Json(req): Json<ResetSiteRequest>,
) -> Response {
    let generation = service.reset_site(&req.site_id);
    let response = ChecklistResponse {
        success: true,
        message: format!("Site {} reset", req.site_id),
        generation: Some(generation),
        view: None,
        quantity_mode: None,
        rows: None,
        warnings: Vec::new(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Reload menu entries from the server
pub async fn reload_menu(
    State(menus): State<Arc<MenuRepository>>,
    Json(req): Json<MenuDateRequest>,
) -> Response {
    match menus.reload(&req.site_id, req.service_date).await {
        Ok(_) => menu_ok(
            &menus,
            &req.site_id,
            req.service_date,
            format!("Reloaded menu for {}", req.service_date),
        ),
        Err(e) => menu_error(e),
    }
}

/// Add or replace a menu entry locally
pub async fn upsert_entry(
    State(menus): State<Arc<MenuRepository>>,
    Json(req): Json<UpsertEntryRequest>,
) -> Response {
    let title = req.entry.title.clone();
    if let Err(e) = menus.upsert_entry(&req.site_id, req.service_date, req.entry) {
        return menu_error(e);
    }
    menu_ok(
        &menus,
        &req.site_id,
        req.service_date,
        format!("Entry '{}' saved, pending sync", title),
    )
}

/// Move a menu entry to another space/section locally
pub async fn move_entry(
    State(menus): State<Arc<MenuRepository>>,
    Json(req): Json<MoveEntryRequest>,
) -> Response {
    match menus.move_entry(&req.site_id, req.service_date, &req.movement) {
        Ok(true) => menu_ok(
            &menus,
            &req.site_id,
            req.service_date,
            format!("Entry '{}' moved to {}, pending sync", req.movement.title, req.movement.to_space),
        ),
        Ok(false) => not_found(&req.movement.space_key, &req.movement.title),
        Err(e) => menu_error(e),
    }
}

/// Remove a menu entry locally
pub async fn remove_entry(
    State(menus): State<Arc<MenuRepository>>,
    Json(req): Json<RemoveEntryRequest>,
) -> Response {
    match menus.remove_entry(&req.site_id, req.service_date, &req.space_key, &req.title) {
        Ok(true) => menu_ok(
            &menus,
            &req.site_id,
            req.service_date,
            format!("Entry '{}' removed, pending sync", req.title),
        ),
        Ok(false) => not_found(&req.space_key, &req.title),
        Err(e) => menu_error(e),
    }
}

/// Push local menu edits to the server
pub async fn sync_menu(
    State(menus): State<Arc<MenuRepository>>,
    Json(req): Json<MenuDateRequest>,
) -> Response {
    match menus.sync(&req.site_id, req.service_date).await {
        Ok(count) => menu_ok(
            &menus,
            &req.site_id,
            req.service_date,
            format!("Synced menu for {}: {} effective entries", req.service_date, count),
        ),
        Err(e) => menu_error(e),
    }
}

fn not_found(space_key: &str, title: &str) -> Response {
    let response = MenuResponse {
        success: false,
        message: format!("No entry '{}' in space {}", title, space_key),
        count: None,
        served: None,
        entries: None,
    };
    (StatusCode::NOT_FOUND, Json(response)).into_response()
}
