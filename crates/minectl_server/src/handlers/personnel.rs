//! /api/personnel — roster listing, search, creation and edits.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    Extension, Json,
};
use minectl_core::{
    proto::{
        HistoryResponse, Message, PersonCreated, PersonnelResponse, SearchQuery, SearchResponse,
        StatusUpdate,
    },
    types::{NewPerson, PersonEdit, PersonnelFilter, PersonnelStats},
    ControlService,
};

use crate::error::AppError;

pub async fn list(
    Extension(service): Extension<Arc<ControlService>>,
    Query(filter): Query<PersonnelFilter>,
) -> Result<Json<PersonnelResponse>, AppError> {
    Ok(Json(service.list_personnel(&filter).await?))
}

pub async fn stats(
    Extension(service): Extension<Arc<ControlService>>,
) -> Result<Json<PersonnelStats>, AppError> {
    Ok(Json(service.personnel_stats().await?))
}

pub async fn search(
    Extension(service): Extension<Arc<ControlService>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    Ok(Json(service.search_personnel(&query).await?))
}

pub async fn create(
    Extension(service): Extension<Arc<ControlService>>,
    payload: Result<Json<NewPerson>, JsonRejection>,
) -> Result<Json<PersonCreated>, AppError> {
    let Json(new) = payload?;
    Ok(Json(service.add_person(new).await?))
}

pub async fn update_status(
    Extension(service): Extension<Arc<ControlService>>,
    Path(id): Path<i64>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Message>, AppError> {
    let Json(update) = payload?;
    Ok(Json(service.update_status(id, &update).await?))
}

pub async fn edit(
    Extension(service): Extension<Arc<ControlService>>,
    Path(id): Path<i64>,
    payload: Result<Json<PersonEdit>, JsonRejection>,
) -> Result<Json<Message>, AppError> {
    let Json(edit) = payload?;
    Ok(Json(service.edit_person(id, edit).await?))
}

pub async fn history(
    Extension(service): Extension<Arc<ControlService>>,
    Path(id): Path<i64>,
) -> Result<Json<HistoryResponse>, AppError> {
    Ok(Json(service.person_history(id).await?))
}
