//! Terrace runs terraform/tofu actions across a fixed set of environments.
//!
//! One action, every environment, in declared order, with per-environment
//! profiles and one aggregated exit code.

pub mod cli;
pub mod core;
pub mod logging;
pub mod provenance;
pub mod transport;
