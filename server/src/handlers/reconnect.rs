//! Reconnection catch-up handler.

use scribe_engine::{catch_up, ClockStamp, ReconnectSnapshot};
use serde::Deserialize;

use crate::error::Result;
use crate::state::{self, now_ms};
use crate::AppState;

/// Request body for reconnection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectRequest {
    /// Session the client is resuming
    pub session_id: String,
    /// Watermark of the last operation the client observed
    /// (milliseconds, may be fractional); absent = replay from the start
    #[serde(default)]
    pub last_known_state: Option<f64>,
}

/// Assemble the catch-up snapshot for a reconnecting client.
pub async fn handle_reconnect(
    state: &AppState,
    document_id: &str,
    request: ReconnectRequest,
) -> Result<ReconnectSnapshot> {
    let now = now_ms();
    let watermark = request
        .last_known_state
        .map(ClockStamp::ticks_from_millis)
        .unwrap_or(0);

    let gate = state.collab.document(document_id);
    let mut collab = gate.lock().await;
    collab.hydrate(&state.pool).await?;

    let mut presence = state::lock(&state.collab.presence)?;
    let mut locks = state::lock(&state.collab.locks)?;
    let snapshot = catch_up(
        &collab.state,
        &collab.log,
        &mut presence,
        &mut locks,
        &request.session_id,
        watermark,
        now,
    );

    tracing::debug!(
        document_id = %document_id,
        missed = snapshot.missed_count(),
        truncated = snapshot.truncated,
        "Reconnect catch-up"
    );

    Ok(snapshot)
}
