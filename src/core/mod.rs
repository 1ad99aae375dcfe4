//! Core orchestration logic: configuration, environments, profiles,
//! planning, execution, and reporting.

pub mod codegen;
pub mod error;
pub mod executor;
pub mod parser;
pub mod planner;
pub mod profile;
pub mod registry;
pub mod report;
pub mod types;
