// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Wire types for the local dev server.
//!
//! These types describe the JSON bodies exchanged with the emulated platform
//! API and the records persisted in the dev config file. They are shared by
//! the server and its integration tests.

pub mod error;
pub mod resources;
pub mod slug;
pub mod types;
pub mod validation;

pub use error::*;
pub use resources::*;
pub use slug::*;
pub use types::*;
