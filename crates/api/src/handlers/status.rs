//! Handlers for current station state and transition history.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use chargewatch_core::registry::{StatusRegistry, DEFAULT_HISTORY_LIMIT, HISTORY_CAPACITY};
use chargewatch_core::station::{StationState, TransitionEvent};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Every station's state plus the most recent transitions.
///
/// Also sent as the `initial_state` WebSocket frame.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub statuses: HashMap<String, StationState>,
    pub history: Vec<TransitionEvent>,
}

impl StatusSnapshot {
    pub async fn collect(registry: &StatusRegistry) -> Self {
        Self {
            statuses: registry.snapshot().await,
            history: registry.recent_history(DEFAULT_HISTORY_LIMIT).await,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct HistoryParams {
    #[validate(range(min = 1, max = 200))]
    pub limit: Option<usize>,
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<DataResponse<StatusSnapshot>> {
    Json(DataResponse {
        data: StatusSnapshot::collect(&state.registry).await,
    })
}

/// GET /api/history?limit=N
///
/// Newest `limit` transitions (default 50, at most 200), oldest first.
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<DataResponse<Vec<TransitionEvent>>>> {
    params.validate()?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(HISTORY_CAPACITY);

    Ok(Json(DataResponse {
        data: state.registry.recent_history(limit).await,
    }))
}
