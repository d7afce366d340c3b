// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Request handlers

pub mod dev;
pub mod health;
pub mod logs;
pub mod prompts;
pub mod resources;
pub mod runs;
pub mod tasks;
pub mod users;
