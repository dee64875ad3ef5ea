//! Application Layer - Ports and services.
//!
//! Ports are the contracts the session needs from the outside world;
//! services drive them.

/// Driven port interfaces (feed, store, archive).
pub mod ports;

/// Record dispatch and session control.
pub mod services;
