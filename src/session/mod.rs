// SPDX-License-Identifier: GPL-3.0-only

//! Remote scan sessions
//!
//! A second device captures cards on behalf of the primary device. The
//! primary creates a session, shows its join code and polls for results;
//! the second device runs its own capture loop and uploads into the session.

pub mod bridge;
pub mod join;
pub mod types;

pub use bridge::{BridgeHandle, PollOutcome, RemoteSessionBridge};
pub use join::{decode_join_code, parse_join_target};
pub use types::RemoteSession;
