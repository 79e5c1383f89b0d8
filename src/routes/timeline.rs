use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::{
    error::AppError,
    models::timeline::{EventPatch, NewEvent, TimelineEvent},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(events_list).post(event_add))
        .route(
            "/:id",
            axum::routing::patch(event_update).delete(event_delete),
        )
}

async fn events_list(State(state): State<AppState>) -> Result<Json<Vec<TimelineEvent>>, AppError> {
    Ok(Json(state.store.timeline().await))
}

async fn event_add(
    State(state): State<AppState>,
    Json(new): Json<NewEvent>,
) -> Result<(StatusCode, Json<TimelineEvent>), AppError> {
    let event = state.store.add_event(new).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn event_update(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(patch): Json<EventPatch>,
) -> Result<Json<TimelineEvent>, AppError> {
    let event = state.store.update_event(&event_id, patch).await?;
    Ok(Json(event))
}

async fn event_delete(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_event(&event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
