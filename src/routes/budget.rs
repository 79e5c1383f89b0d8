use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::{
        category::{Category, CategoryPatch},
        member::{Member, MemberPatch},
    },
    prefs::{SortColumn, SortDirection},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/members", get(members_list).post(member_add))
        .route("/members/:id", axum::routing::patch(member_update).delete(member_delete))
        .route("/members/:id/balance", get(member_balance))
        .route("/categories", get(categories_list).post(category_add))
        .route(
            "/categories/:id",
            axum::routing::patch(category_update).delete(category_delete),
        )
        .route("/sort", put(sort_update))
}

async fn members_list(State(state): State<AppState>) -> Result<Json<Vec<Member>>, AppError> {
    Ok(Json(state.store.members().await))
}

#[derive(Deserialize)]
struct AddMemberRequest {
    name: String,
}

async fn member_add(
    State(state): State<AppState>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Member>), AppError> {
    let member = state.store.add_member(&req.name).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn member_update(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
    Json(patch): Json<MemberPatch>,
) -> Result<Json<Member>, AppError> {
    let member = state.store.update_member(&member_id, patch).await?;
    Ok(Json(member))
}

async fn member_delete(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_member(&member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct MemberBalance {
    member_id: String,
    balance: f64,
}

async fn member_balance(
    State(state): State<AppState>,
    Path(member_id): Path<String>,
) -> Result<Json<MemberBalance>, AppError> {
    let balance = state.store.member_balance(&member_id).await;
    Ok(Json(MemberBalance { member_id, balance }))
}

async fn categories_list(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.store.categories().await))
}

#[derive(Deserialize)]
struct AddCategoryRequest {
    name: String,
    #[serde(default)]
    planned: f64,
    color: String,
    icon: String,
}

async fn category_add(
    State(state): State<AppState>,
    Json(req): Json<AddCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = state
        .store
        .add_category(&req.name, req.planned, &req.color, &req.icon)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn category_update(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
    Json(patch): Json<CategoryPatch>,
) -> Result<Json<Category>, AppError> {
    let category = state.store.update_category(&category_id, patch).await?;
    Ok(Json(category))
}

async fn category_delete(
    State(state): State<AppState>,
    Path(category_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_category(&category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SortRequest {
    column: Option<SortColumn>,
    direction: SortDirection,
}

async fn sort_update(
    State(state): State<AppState>,
    Json(req): Json<SortRequest>,
) -> Result<StatusCode, AppError> {
    state.store.set_sort_column(req.column).await?;
    state.store.set_sort_direction(req.direction).await?;
    Ok(StatusCode::NO_CONTENT)
}
