use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use storeops_audits::AuditId;

use crate::app::dto::{self, AuditView, CountResponse, ReconcileResponse};
use crate::app::errors::ApiError;
use crate::app::routes::common::{blocking, parse_id};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(plan_audit))
        .route("/:id", get(get_audit))
        .route("/:id/start", post(start_audit))
        .route("/:id/items", put(count_items))
        .route("/:id/items/:item_id/reconcile", post(reconcile_item))
}

pub async fn plan_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::PlanAuditBody>,
) -> Result<impl IntoResponse, ApiError> {
    let actor_id = actor.actor_id();
    let audit = blocking(services, move |s| s.audits.plan(body.into(), actor_id)).await?;
    Ok((StatusCode::CREATED, Json(AuditView::from(&audit))))
}

pub async fn get_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let audit_id: AuditId = parse_id(&id)?;
    let audit = blocking(services, move |s| s.audits.get(audit_id)).await?;
    Ok(Json(AuditView::from(&audit)))
}

pub async fn start_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let audit_id: AuditId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let audit = blocking(services, move |s| s.audits.start(audit_id, actor_id)).await?;
    Ok(Json(AuditView::from(&audit)))
}

pub async fn count_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateAuditItemsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let audit_id: AuditId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let outcome = blocking(services, move |s| {
        s.audits.record_counts(audit_id, body.into_counts(), actor_id)
    })
    .await?;
    Ok(Json(CountResponse::from(outcome)))
}

pub async fn reconcile_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path((id, item_id)): Path<(String, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    let audit_id: AuditId = parse_id(&id)?;
    let actor_id = actor.actor_id();
    let outcome = blocking(services, move |s| s.audits.reconcile(audit_id, item_id, actor_id)).await?;
    Ok(Json(ReconcileResponse::from(outcome)))
}
