//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (gate.rs):
//!     Validate config → CONNECTING → connect with retries
//!     → bind listener → READY → accept traffic
//!
//! Shutdown (gate.rs, shutdown.rs):
//!     Signal received → SHUTTING_DOWN → stop accepting
//!     → drain in-flight requests (bounded by grace) → release dependency
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → LifecycleGate::shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then dependency, then listener
//! - Ordered shutdown: stop accept, drain, close dependency
//! - Shutdown has a deadline: remaining requests are aborted after grace
//! - Shutdown during CONNECTING cancels startup and ends FAILED

pub mod gate;
pub mod monitor;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use gate::LifecycleGate;
pub use monitor::{GateMonitor, GateStatus};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::{IllegalTransition, LifecycleEvent, LifecycleState};
