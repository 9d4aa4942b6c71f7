//! Logging setup shared by the nightingale binaries.
//!
//! Everything logs through `tracing`; this crate only decides where the events go and how they look.
mod logger;
pub use logger::*;
