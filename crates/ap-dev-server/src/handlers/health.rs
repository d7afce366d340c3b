// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Health check endpoints

use axum::Json;
use serde::Serialize;

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
}

/// Liveness probe used by the CLI before it starts issuing requests
pub async fn ping() -> &'static str {
    "ok"
}

/// Version endpoint
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
