//! Test modules for the service registry
//!
//! Tests are organized by functional area: graph resolution behavior and
//! lifecycle/removal behavior.

mod lifecycle;
mod resolution;
