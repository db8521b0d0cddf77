//! Layered configuration loader
//!
//! Merges `base.yaml`, an optional `<environment>.yaml` and prefixed
//! environment variables from one config directory, then decodes the result
//! into typed structs.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
