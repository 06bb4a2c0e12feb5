//! SIGNA Stabilize - Temporal stabilization of per-frame sign labels
//!
//! This crate turns flickering classifier output into committed letters:
//! - Landmark window feeding the motion classifier
//! - Rolling majority vote per classifier stream
//! - Static/dynamic decision fusion
//! - Confirmation state machine with cooldown and ambiguous glyph families
//!
//! Nothing here blocks or spawns. Timers go through the [`Scheduler`]
//! abstraction so the same state machine runs under tokio or on virtual time.

pub mod confirm;
pub mod fusion;
pub mod stabilizer;
pub mod timer;
pub mod voter;
pub mod window;

pub use confirm::*;
pub use fusion::*;
pub use stabilizer::*;
pub use timer::*;
pub use voter::*;
pub use window::*;
