use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::directory::SeedOutcome;
use crate::error::{AppError, AppResult};

use super::AppState;

#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

pub async fn list_universities(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.universities.list_names().await?))
}

/// Development-only: disabled unless ENABLE_UNIVERSITY_SEED is set.
pub async fn seed_universities(State(state): State<AppState>) -> AppResult<Json<SeedResponse>> {
    if !state.enable_university_seed {
        return Err(AppError::NotFound("Not found".to_string()));
    }

    let response = match state.universities.seed().await? {
        SeedOutcome::AlreadySeeded => SeedResponse {
            message: "Universities already seeded",
            count: None,
        },
        SeedOutcome::Seeded(count) => SeedResponse {
            message: "Universities seeded successfully",
            count: Some(count),
        },
    };
    Ok(Json(response))
}
