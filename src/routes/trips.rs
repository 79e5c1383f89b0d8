use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, models::trip::Trip, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(trips_list).post(trip_create))
        .route("/:id", axum::routing::delete(trip_delete))
        .route("/:id/select", post(trip_select))
        .route("/dates", put(trip_set_dates))
        .route("/summary", get(trip_summary))
}

async fn trips_list(State(state): State<AppState>) -> Result<Json<Vec<Trip>>, AppError> {
    Ok(Json(state.store.trips().await))
}

#[derive(Deserialize)]
struct CreateTripRequest {
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

async fn trip_create(
    State(state): State<AppState>,
    Json(req): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let trip = state
        .store
        .create_trip(&req.name, req.start_date, req.end_date)
        .await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn trip_delete(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_trip(&trip_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn trip_select(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.set_current_trip(&trip_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SetDatesRequest {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

async fn trip_set_dates(
    State(state): State<AppState>,
    Json(req): Json<SetDatesRequest>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .set_trip_dates(req.start_date, req.end_date)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct TripSummary {
    trip: Option<Trip>,
    total_planned: f64,
    total_member_planned: f64,
    total_actual: f64,
    total_given: f64,
}

async fn trip_summary(State(state): State<AppState>) -> Result<Json<TripSummary>, AppError> {
    let store = &state.store;
    Ok(Json(TripSummary {
        trip: store.active_trip().await,
        total_planned: store.total_planned().await,
        total_member_planned: store.total_member_planned().await,
        total_actual: store.total_actual().await,
        total_given: store.total_given().await,
    }))
}
