//! Connection-gated service lifecycle library.
//!
//! A network service built on this crate only accepts traffic after its
//! backing dependency (database, cache, queue) has answered, and on
//! shutdown stops accepting, drains, then releases that dependency.

pub mod config;
pub mod dependency;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::ServiceConfig;
pub use dependency::{Connector, DependencyError, DependencyHandle, TcpConnector};
pub use error::{ShutdownError, StartupError};
pub use lifecycle::{GateStatus, LifecycleGate, LifecycleState};
