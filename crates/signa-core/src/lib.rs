//! SIGNA Core - Fundamental types and configuration
//!
//! This crate defines the types shared by every stage of the sign pipeline:
//! - Key-points and hand landmark snapshots
//! - Classification results and confirmed letter events
//! - Pipeline configuration with validation
//! - The error type

pub mod config;
pub mod error;
pub mod event;
pub mod landmark;

pub use config::*;
pub use error::*;
pub use event::*;
pub use landmark::*;
