use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[sqlx(rename = "planned_amount")]
    pub planned: f64,
    #[sqlx(rename = "actual_amount")]
    pub actual: f64,
    pub color: String,
    pub icon: String,
    pub trip_id: String,
}

impl Category {
    pub fn new(
        name: impl Into<String>,
        planned: f64,
        color: impl Into<String>,
        icon: impl Into<String>,
        trip_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            planned,
            actual: 0.0,
            color: color.into(),
            icon: icon.into(),
            trip_id: trip_id.into(),
        }
    }
}

/// Partial update for a category; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub planned: Option<f64>,
    pub actual: Option<f64>,
    pub color: Option<String>,
    pub icon: Option<String>,
}
