//! Test modules for the messaging core
//!
//! Tests are organized by functional area for better maintainability.

mod support;

mod lifecycle;
