use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use storeops_core::LocationId;

use crate::app::dto::{self, LocationView, StockLevelView};
use crate::app::errors::ApiError;
use crate::app::routes::common::{blocking, parse_id};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_location).get(list_locations))
        .route("/:id", get(get_location))
        .route("/:id/deactivate", post(deactivate_location))
        .route("/:id/reactivate", post(reactivate_location))
        .route("/:id/stock", get(location_stock))
}

pub async fn register_location(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterLocationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let location = blocking(services, move |s| {
        let id = s.locations.register(&body.code, &body.name, body.kind)?;
        s.locations.get(id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(LocationView::from(&location))))
}

pub async fn list_locations(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let locations = blocking(services, |s| s.locations.list()).await?;
    Ok(Json(locations.iter().map(LocationView::from).collect::<Vec<_>>()))
}

pub async fn get_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let location_id: LocationId = parse_id(&id)?;
    let location = blocking(services, move |s| s.locations.get(location_id)).await?;
    Ok(Json(LocationView::from(&location)))
}

pub async fn deactivate_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let location_id: LocationId = parse_id(&id)?;
    let location = blocking(services, move |s| s.locations.deactivate(location_id)).await?;
    Ok(Json(LocationView::from(&location)))
}

pub async fn reactivate_location(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let location_id: LocationId = parse_id(&id)?;
    let location = blocking(services, move |s| s.locations.reactivate(location_id)).await?;
    Ok(Json(LocationView::from(&location)))
}

pub async fn location_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let location_id: LocationId = parse_id(&id)?;
    let levels = blocking(services, move |s| s.locations.stock(location_id)).await?;
    Ok(Json(levels.into_iter().map(StockLevelView::from).collect::<Vec<_>>()))
}
