//! # Ballrush Engine
//!
//! Persistence and orchestration for Ballrush.
//!
//! This crate wires the gameplay core to storage:
//! - Versioned save record and its codec
//! - Local and cloud storage backends
//! - Background cloud worker
//! - Local-first save sync with conflict resolution
//! - Platform sign-in state
//! - Application configuration
//! - [`GameSession`], the single entry point for a UI layer

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod account;
pub mod cloud_storage;
pub mod cloud_worker;
pub mod config;
pub mod game_session;
pub mod save_record;
pub mod save_sync;

#[cfg(test)]
mod e2e_tests;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::account::*;
    pub use crate::cloud_storage::*;
    pub use crate::cloud_worker::*;
    pub use crate::config::*;
    pub use crate::game_session::*;
    pub use crate::save_record::*;
    pub use crate::save_sync::*;
}

pub use prelude::*;
