use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod documents;
pub mod flats;
pub mod health;
pub mod identity;
pub mod members;
pub mod payments;
pub mod reports;
pub mod rents;
pub mod tenant;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/me", get(identity::me))
        .merge(flats::router())
        .merge(members::router())
        .merge(rents::router())
        .merge(payments::router())
        .merge(reports::router())
        .merge(tenant::router())
        .merge(documents::router())
}
