//! Rule-based lead scoring for the CRM: administrator-defined rules are
//! evaluated against each lead to produce a bounded score with a per-rule
//! breakdown, optionally nudged by an AI adjustment step.

pub mod config;
pub mod error;
pub mod import;
pub mod scoring;
pub mod telemetry;
