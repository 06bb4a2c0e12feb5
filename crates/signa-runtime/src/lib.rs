//! SIGNA Runtime - Gesture interpreter runtime
//!
//! Glues the stabilization core to the outside world:
//! - Key-point extraction and classifier preprocessing
//! - Classifier capability, label tables and the per-model locked bank
//! - Synchronous `GestureInterpreter` that owns all per-hand state
//! - Tokio actor with keep-latest frame handoff and cancellable cooldown timers
//! - Confirmed-letter sinks and logging setup
//! - Offline replay of recorded label streams

pub mod actor;
pub mod classifier;
pub mod extract;
pub mod interpreter;
pub mod logging;
pub mod replay;
pub mod sink;

pub use actor::*;
pub use classifier::*;
pub use extract::*;
pub use interpreter::*;
pub use logging::*;
pub use replay::*;
pub use sink::*;
