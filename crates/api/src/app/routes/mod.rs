use axum::{routing::get, Router};

pub mod audits;
pub mod common;
pub mod inventory;
pub mod locations;
pub mod loyalty;
pub mod purchases;
pub mod sales;
pub mod system;
pub mod transfers;

/// Router for all endpoints that act on behalf of an actor.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(sales::checkout_router())
        .nest("/locations", locations::router())
        .nest("/inventory", inventory::router())
        .nest("/transfers", transfers::router())
        .nest("/audits", audits::router())
        .nest("/purchase-orders", purchases::router())
        .nest("/sales", sales::router())
        .nest("/loyalty", loyalty::router())
}
