use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storeops_purchasing::PurchaseOrderId;

use crate::app::dto::{self, PurchaseOrderView, ReceivePurchaseOrderResponse};
use crate::app::errors::ApiError;
use crate::app::routes::common::{blocking, parse_id};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/:id", get(get_purchase_order))
        .route("/:id/lines", post(add_line))
        .route("/:id/place", post(place_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
        .route("/:id/receive", post(receive_purchase_order))
}

pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreatePurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor_id = actor.actor_id();
    let order = blocking(services, move |s| s.receiving.create(body.into(), actor_id)).await?;
    Ok((StatusCode::CREATED, Json(PurchaseOrderView::from(&order))))
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id: PurchaseOrderId = parse_id(&id)?;
    let order = blocking(services, move |s| s.receiving.get(order_id)).await?;
    Ok(Json(PurchaseOrderView::from(&order)))
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::OrderLineBody>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id: PurchaseOrderId = parse_id(&id)?;
    let order = blocking(services, move |s| s.receiving.add_line(order_id, body.into())).await?;
    Ok(Json(PurchaseOrderView::from(&order)))
}

pub async fn place_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id: PurchaseOrderId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let order = blocking(services, move |s| s.receiving.place(order_id, actor_id)).await?;
    Ok(Json(PurchaseOrderView::from(&order)))
}

pub async fn cancel_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id: PurchaseOrderId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let reason = body.and_then(|Json(b)| b.reason);
    let order = blocking(services, move |s| s.receiving.cancel(order_id, reason, actor_id)).await?;
    Ok(Json(PurchaseOrderView::from(&order)))
}

/// Partial receipts are allowed; receiving past the ordered quantity on any
/// line rejects the whole request.
pub async fn receive_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReceivePurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id: PurchaseOrderId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let received = blocking(services, move |s| {
        let receipts = body.receipts();
        s.receiving.receive(order_id, receipts, body.notes, actor_id)
    })
    .await?;
    Ok(Json(ReceivePurchaseOrderResponse::from(received)))
}
