use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::{
    error::AppError,
    models::expense::{Expense, ExpensePatch, NewExpense},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(expenses_list).post(expense_add))
        .route(
            "/:id",
            axum::routing::patch(expense_update).delete(expense_delete),
        )
}

async fn expenses_list(State(state): State<AppState>) -> Result<Json<Vec<Expense>>, AppError> {
    Ok(Json(state.store.expenses().await))
}

async fn expense_add(
    State(state): State<AppState>,
    Json(new): Json<NewExpense>,
) -> Result<(StatusCode, Json<Expense>), AppError> {
    let expense = state.store.add_expense(new).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

async fn expense_update(
    State(state): State<AppState>,
    Path(expense_id): Path<String>,
    Json(patch): Json<ExpensePatch>,
) -> Result<Json<Expense>, AppError> {
    let expense = state.store.update_expense(&expense_id, patch).await?;
    Ok(Json(expense))
}

async fn expense_delete(
    State(state): State<AppState>,
    Path(expense_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.store.delete_expense(&expense_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
