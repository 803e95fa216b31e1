use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storeops_transfers::{TransferId, TransferStatus};

use crate::app::dto::{self, ProcessTransferResponse, TransferAction, TransferView};
use crate::app::errors::ApiError;
use crate::app::routes::common::{blocking, parse_id};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_transfer))
        .route(
            "/:id",
            get(get_transfer)
                .put(update_transfer)
                .patch(patch_transfer)
                .delete(delete_transfer),
        )
        .route("/:id/process", post(process_transfer))
}

pub async fn create_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateTransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let actor_id = actor.actor_id();
    let transfer = blocking(services, move |s| s.transfers.create(body.into(), actor_id)).await?;
    Ok((StatusCode::CREATED, Json(TransferView::from(&transfer))))
}

pub async fn get_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer_id: TransferId = parse_id(&id)?;
    let transfer = blocking(services, move |s| s.transfers.get(transfer_id)).await?;
    Ok(Json(TransferView::from(&transfer)))
}

/// Edit a DRAFT or PENDING transfer.
pub async fn update_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateTransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer_id: TransferId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let transfer = blocking(services, move |s| {
        s.transfers.update(transfer_id, body.into(), actor_id)
    })
    .await?;
    Ok(Json(TransferView::from(&transfer)))
}

pub async fn patch_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PatchTransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer_id: TransferId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let transfer = blocking(services, move |s| match body.status {
        TransferStatus::Rejected => s.transfers.reject(transfer_id, body.reason, actor_id),
        TransferStatus::Cancelled => s.transfers.cancel(transfer_id, body.reason, actor_id),
        status => s.transfers.patch_status(transfer_id, status, actor_id),
    })
    .await?;
    Ok(Json(TransferView::from(&transfer)))
}

pub async fn delete_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer_id: TransferId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    blocking(services, move |s| s.transfers.delete(transfer_id, actor_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `ship` moves APPROVED to IN_TRANSIT and removes stock at the source;
/// `receive` completes and adds stock at the destination.
pub async fn process_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ProcessTransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let transfer_id: TransferId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let (transfer, movements) = blocking(services, move |s| match body.action {
        TransferAction::Ship => s.transfers.ship(transfer_id, body.shipment(), actor_id),
        TransferAction::Receive => s.transfers.receive(transfer_id, body.notes, actor_id),
    })
    .await?;
    Ok(Json(ProcessTransferResponse {
        transfer: TransferView::from(&transfer),
        movements: dto::movements(movements),
    }))
}
