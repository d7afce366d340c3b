// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Log streaming over SSE
//!
//! One `data:` event per log line, history first. The stream ends when the
//! run finishes; dropping the response detaches the listener.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::ServerResult;
use crate::error::ServerError;
use crate::state::AppState;

pub async fn stream_logs(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ServerResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let broker = state
        .runs
        .log_broker(&run_id)
        .await
        .ok_or_else(|| ServerError::RunNotFound(run_id.clone()))?;

    debug!(run_id = %run_id, "log listener attached");
    let events = broker.stream().map(|line| Event::default().json_data(line));

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive")))
}
