use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storeops_inventory::InventoryRecordId;

use crate::app::dto::{self, MovementView, StockLevelView};
use crate::app::errors::ApiError;
use crate::app::routes::common::{blocking, parse_id};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/receive", post(receive_stock))
        .route("/items/:id", get(get_item))
        .route("/items/:id/movements", get(item_movements))
        .route("/items/:id/adjust", post(adjust_stock))
        .route("/items/:id/reserve", post(reserve_stock))
        .route("/items/:id/release-reservation", post(release_reservation))
        .route("/items/:id/quarantine", post(quarantine_stock))
        .route("/items/:id/release-quarantine", post(release_quarantine))
        .route("/items/:id/condition", post(mark_condition))
}

/// Direct ADD, creating the record on first receipt.
pub async fn receive_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::ReceiveStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor_id = actor.actor_id();
    let level = blocking(services, move |s| s.ledger.receive_stock(body.into(), actor_id)).await?;
    Ok((StatusCode::CREATED, Json(StockLevelView::from(level))))
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record_id: InventoryRecordId = parse_id(&id)?;
    let level = blocking(services, move |s| s.ledger.record(record_id)).await?;
    Ok(Json(StockLevelView::from(level)))
}

pub async fn item_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record_id: InventoryRecordId = parse_id(&id)?;
    let entries = blocking(services, move |s| s.ledger.movements(record_id)).await?;
    Ok(Json(dto::movements(entries)))
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record_id: InventoryRecordId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let (movement, level) = blocking(services, move |s| {
        let movement = s.ledger.adjust(body.into_adjustment(record_id), actor_id)?;
        let level = s.ledger.record(record_id)?;
        Ok((movement, level))
    })
    .await?;
    Ok(Json(serde_json::json!({
        "item": StockLevelView::from(level),
        "movement": MovementView::from(movement),
    })))
}

pub async fn reserve_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReservationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record_id: InventoryRecordId = parse_id(&id)?;
    let level = blocking(services, move |s| s.ledger.reserve(record_id, body.quantity)).await?;
    Ok(Json(StockLevelView::from(level)))
}

pub async fn release_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReservationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record_id: InventoryRecordId = parse_id(&id)?;
    let level = blocking(services, move |s| {
        s.ledger.release_reservation(record_id, body.quantity)
    })
    .await?;
    Ok(Json(StockLevelView::from(level)))
}

/// Quarantined stock stays on hand but cannot be sold.
pub async fn quarantine_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuarantineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record_id: InventoryRecordId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let level = blocking(services, move |s| {
        s.ledger.quarantine(record_id, body.reason, actor_id)
    })
    .await?;
    Ok(Json(StockLevelView::from(level)))
}

pub async fn release_quarantine(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record_id: InventoryRecordId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let level = blocking(services, move |s| s.ledger.release_quarantine(record_id, actor_id)).await?;
    Ok(Json(StockLevelView::from(level)))
}

pub async fn mark_condition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ConditionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record_id: InventoryRecordId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let level = blocking(services, move |s| {
        s.ledger.mark_condition(record_id, body.condition, actor_id)
    })
    .await?;
    Ok(Json(StockLevelView::from(level)))
}
