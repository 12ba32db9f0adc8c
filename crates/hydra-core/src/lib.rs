//! Shared runtime scaffolding for hydra binaries and libraries.
//!
//! Currently limited to process-wide logging initialization. Kept as its own
//! crate so future cross-cutting concerns (metrics, shared error types) have
//! somewhere to live without pulling the gateway crate along for the ride.

pub mod logging;
