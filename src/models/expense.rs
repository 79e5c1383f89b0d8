use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub id: String,
    pub title: String,
    pub amount: f64,
    pub category_id: String,
    pub paid_by: String,
    pub trip_id: String,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn from_new(new: NewExpense, trip_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            amount: new.amount,
            category_id: new.category_id,
            paid_by: new.paid_by,
            trip_id: trip_id.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    pub title: String,
    pub amount: f64,
    pub category_id: String,
    pub paid_by: String,
}

/// Partial update for an expense; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpensePatch {
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub category_id: Option<String>,
    pub paid_by: Option<String>,
}
