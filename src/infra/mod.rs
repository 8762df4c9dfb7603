//! Infrastructure adapters and runtime bootstrap.

pub mod bootstrap;
pub mod error;
pub mod http;
pub mod memory;
pub mod telemetry;
