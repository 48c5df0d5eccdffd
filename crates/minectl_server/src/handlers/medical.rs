//! /api/medical — shift, schedule, checks, scan/deny and the shift reset.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, Request},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use minectl_core::{
    proto::{
        ChecksResponse, CheckRecorded, CurrentShiftResponse, DenyRequest, LimitQuery,
        NewCheckRequest, ResetsResponse, ScanOutcome, ScanRequest, ScheduleResponse,
        ScheduleSaved, StatsQuery,
    },
    schedule::ScheduleUpdate,
    types::{CheckFilter, MedicalStats},
    ControlService, ReconcileOutcome,
};

use crate::error::AppError;
use crate::export::{checks_csv, REPORT_FILENAME};

/// Runs the best-effort reset before the wrapped request when enabled.
pub async fn reset_on_request(
    Extension(service): Extension<Arc<ControlService>>,
    request: Request,
    next: Next,
) -> Response {
    service.reconciler().reconcile_best_effort().await;
    next.run(request).await
}

pub async fn current_shift(
    Extension(service): Extension<Arc<ControlService>>,
) -> Json<CurrentShiftResponse> {
    Json(service.current_shift().await)
}

pub async fn get_schedule(
    Extension(service): Extension<Arc<ControlService>>,
) -> Json<ScheduleResponse> {
    Json(ScheduleResponse {
        schedule: service.schedule().await,
    })
}

pub async fn save_schedule(
    Extension(service): Extension<Arc<ControlService>>,
    payload: Result<Json<ScheduleUpdate>, JsonRejection>,
) -> Result<Json<ScheduleSaved>, AppError> {
    let Json(update) = payload?;
    Ok(Json(service.save_schedule(&update).await?))
}

pub async fn list_checks(
    Extension(service): Extension<Arc<ControlService>>,
    Query(filter): Query<CheckFilter>,
) -> Result<Json<ChecksResponse>, AppError> {
    Ok(Json(service.list_checks(&filter).await?))
}

pub async fn record_check(
    Extension(service): Extension<Arc<ControlService>>,
    payload: Result<Json<NewCheckRequest>, JsonRejection>,
) -> Result<Json<CheckRecorded>, AppError> {
    let Json(request) = payload?;
    Ok(Json(service.record_check(&request).await?))
}

pub async fn stats(
    Extension(service): Extension<Arc<ControlService>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<MedicalStats>, AppError> {
    Ok(Json(service.medical_stats(&query).await?))
}

/// GET /api/medical/export — the filtered checks as a CSV attachment.
pub async fn export(
    Extension(service): Extension<Arc<ControlService>>,
    Query(filter): Query<CheckFilter>,
) -> Result<Response, AppError> {
    let checks = service.export_checks(&filter).await?;
    let body = checks_csv(&checks, service.site_offset())?;
    tracing::debug!(rows = checks.len(), "Medical report exported");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{REPORT_FILENAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}

pub async fn scan(
    Extension(service): Extension<Arc<ControlService>>,
    payload: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<Json<ScanOutcome>, AppError> {
    let Json(request) = payload?;
    Ok(Json(service.scan(&request).await?))
}

pub async fn deny(
    Extension(service): Extension<Arc<ControlService>>,
    payload: Result<Json<DenyRequest>, JsonRejection>,
) -> Result<Json<ScanOutcome>, AppError> {
    let Json(request) = payload?;
    Ok(Json(service.deny(&request).await?))
}

pub async fn reset(
    Extension(service): Extension<Arc<ControlService>>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    Ok(Json(service.reset_now().await?))
}

pub async fn list_resets(
    Extension(service): Extension<Arc<ControlService>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ResetsResponse>, AppError> {
    Ok(Json(service.list_resets(query.limit).await?))
}
