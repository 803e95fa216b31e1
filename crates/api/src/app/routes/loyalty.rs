use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storeops_core::CustomerId;
use storeops_loyalty::LoyaltyProgramId;

use crate::app::dto::{self, LoyaltyAccountView, ProgramView};
use crate::app::errors::ApiError;
use crate::app::routes::common::{blocking, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/programs", post(create_program))
        .route("/programs/:id", get(get_program))
        .route("/programs/:id/deactivate", post(deactivate_program))
        .route("/accounts", post(enroll))
        .route("/accounts/:customer_id", get(get_account))
        .route("/accounts/:customer_id/transactions", post(post_transaction))
}

pub async fn create_program(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateProgramRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let program = blocking(services, move |s| s.loyalty.create_program(body.into())).await?;
    Ok((StatusCode::CREATED, Json(ProgramView::from(&program))))
}

pub async fn get_program(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let program_id: LoyaltyProgramId = parse_id(&id)?;
    let program = blocking(services, move |s| s.loyalty.program(program_id)).await?;
    Ok(Json(ProgramView::from(&program)))
}

pub async fn deactivate_program(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let program_id: LoyaltyProgramId = parse_id(&id)?;
    let program = blocking(services, move |s| s.loyalty.deactivate_program(program_id)).await?;
    Ok(Json(ProgramView::from(&program)))
}

pub async fn enroll(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::EnrollRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = blocking(services, move |s| s.loyalty.enroll(body.customer_id, body.program_id)).await?;
    Ok((StatusCode::CREATED, Json(LoyaltyAccountView::from(&account))))
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(customer_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let customer_id: CustomerId = parse_id(&customer_id)?;
    let account = blocking(services, move |s| s.loyalty.account(customer_id)).await?;
    Ok(Json(LoyaltyAccountView::from(&account)))
}

/// BONUS, ADJUST and EXPIRE postings.
pub async fn post_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Path(customer_id): Path<String>,
    Json(body): Json<dto::LoyaltyTransactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let customer_id: CustomerId = parse_id(&customer_id)?;
    let account = blocking(services, move |s| {
        s.loyalty
            .post_transaction(customer_id, body.kind, body.points, body.reference, body.description)
    })
    .await?;
    Ok(Json(LoyaltyAccountView::from(&account)))
}
