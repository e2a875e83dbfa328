// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer
//!
//! The scanning pipeline talks to two external collaborators:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Scanner Layer                  │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────┐    ┌──────────────────┐   │
//! │  │   Camera    │    │   Recognition    │   │
//! │  │  (frames)   │    │     (HTTP)       │   │
//! │  └─────────────┘    └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! - [`camera`]: frame type and frame sources
//! - [`recognition`]: card recognition and remote session endpoints

pub mod camera;
pub mod recognition;
