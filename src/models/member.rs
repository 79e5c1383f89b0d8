use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: String,
    pub name: String,
    #[sqlx(rename = "planned_amount")]
    pub planned: f64,
    #[sqlx(rename = "given_amount")]
    pub given: f64,
    pub trip_id: String,
}

impl Member {
    pub fn new(name: impl Into<String>, trip_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            planned: 0.0,
            given: 0.0,
            trip_id: trip_id.into(),
        }
    }
}

/// Partial update for a member; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberPatch {
    pub name: Option<String>,
    pub planned: Option<f64>,
    pub given: Option<f64>,
}
