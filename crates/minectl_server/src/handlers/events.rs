use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use minectl_core::{
    proto::{EventsResponse, LimitQuery, MarkedRead, Message, NotificationsQuery, NotificationsResponse},
    ControlService,
};

use crate::error::AppError;

pub async fn list_events(
    Extension(service): Extension<Arc<ControlService>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<EventsResponse>, AppError> {
    Ok(Json(service.list_events(&query).await?))
}

pub async fn list_notifications(
    Extension(service): Extension<Arc<ControlService>>,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<NotificationsResponse>, AppError> {
    Ok(Json(service.list_notifications(&query).await?))
}

pub async fn mark_read(
    Extension(service): Extension<Arc<ControlService>>,
    Path(id): Path<i64>,
) -> Result<Json<Message>, AppError> {
    Ok(Json(service.mark_notification_read(id).await?))
}

pub async fn mark_all_read(
    Extension(service): Extension<Arc<ControlService>>,
) -> Result<Json<MarkedRead>, AppError> {
    Ok(Json(service.mark_all_notifications_read().await?))
}
