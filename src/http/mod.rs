//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! Collaborator Router (handlers registered before start)
//!     → server.rs (wrap with gate middleware, wait for the gate to open)
//!     → request.rs (request ID, admission slot, in-flight guard)
//!     → collaborator handler
//!     → status.rs (optional /health reporting the gate state)
//! ```

pub mod request;
pub mod server;
pub mod status;

pub use request::{Admission, MakeRequestUuid, X_REQUEST_ID};
pub use server::GateServer;
pub use status::{status_handler, status_routes};
