pub mod budget;
pub mod expenses;
pub mod timeline;
pub mod trips;

use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/trips", trips::router())
        .nest("/budget", budget::router())
        .nest("/expenses", expenses::router())
        .nest("/timeline", timeline::router())
        .with_state(state)
}
