use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
        }),
    )
}

#[derive(Serialize)]
pub struct GroupBacklog {
    pub stream: String,
    pub group: String,
    pub pending: u64,
    pub oldest_id: Option<String>,
    pub consumers: Vec<ConsumerBacklog>,
    /// Set when the bus could not be queried for this group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ConsumerBacklog {
    pub name: String,
    pub pending: u64,
}

/// Pending-entry counts for every monitored consumer group.
pub async fn backlog_handler(State(state): State<AppState>) -> Json<Vec<GroupBacklog>> {
    let mut backlog = Vec::with_capacity(state.monitored_groups.len());
    for (stream, group) in state.monitored_groups.iter() {
        let entry = match state.bus.pending(*stream, group).await {
            Ok(summary) => GroupBacklog {
                stream: stream.as_str().to_string(),
                group: group.clone(),
                pending: summary.count,
                oldest_id: summary.oldest_id.map(|id| id.to_string()),
                consumers: summary
                    .consumers
                    .into_iter()
                    .map(|(name, pending)| ConsumerBacklog { name, pending })
                    .collect(),
                error: None,
            },
            Err(e) => GroupBacklog {
                stream: stream.as_str().to_string(),
                group: group.clone(),
                pending: 0,
                oldest_id: None,
                consumers: Vec::new(),
                error: Some(e.to_string()),
            },
        };
        backlog.push(entry);
    }
    Json(backlog)
}
