use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storeops_sales::SaleId;

use crate::app::dto::{self, CheckoutResponse, ReturnResponse, SaleView};
use crate::app::errors::ApiError;
use crate::app::routes::common::{blocking, parse_id};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn checkout_router() -> Router {
    Router::new().route("/checkout", post(checkout))
}

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_sale))
        .route("/:id/returns", post(return_items))
}

/// Record a sale, decrement stock per line and apply loyalty, all or nothing.
pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CheckoutBody>,
) -> Result<impl IntoResponse, ApiError> {
    let cashier_id = actor.actor_id();
    let outcome = blocking(services, move |s| s.checkout.checkout(body.into(), cashier_id)).await?;
    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(outcome))))
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let sale_id: SaleId = parse_id(&id)?;
    let sale = blocking(services, move |s| s.checkout.get(sale_id)).await?;
    Ok(Json(SaleView::from(&sale)))
}

pub async fn return_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SaleReturnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sale_id: SaleId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let outcome = blocking(services, move |s| {
        s.returns.process_return(sale_id, body.into(), actor_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(ReturnResponse::from(outcome))))
}
