//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Dependency ready
//!     → listener.rs (bind host:port, typed bind errors)
//!     → gate opens, HTTP layer starts accepting
//!     → connection.rs (per-request in-flight guard)
//!
//! Shutdown:
//!     stop accepting → in-flight count drains to zero → dependency closed
//! ```
//!
//! # Design Decisions
//! - Binding happens before the gate opens, accepting only after
//! - Each request is tracked so drain progress can be reported

pub mod connection;
pub mod listener;

pub use connection::{RequestGuard, RequestTracker};
pub use listener::ListenerError;
