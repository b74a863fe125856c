//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build guards → Spawn sweepers → Serve
//!
//! Background (sweeper.rs):
//!     interval tick → Sweep::sweep() on one store → metrics + debug log
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → server drains, sweepers exit
//! ```
//!
//! # Design Decisions
//! - Each store gets exactly one sweeper task for the life of the process
//! - Sweepers and the server share one broadcast shutdown signal

pub mod shutdown;
pub mod signals;
pub mod sweeper;

pub use shutdown::Shutdown;
pub use sweeper::{spawn_periodic, spawn_sweeper, Sweep};
