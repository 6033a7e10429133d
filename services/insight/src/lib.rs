//! services/insight/src/lib.rs
//!
//! Adapters, configuration and the interactive query console for the
//! `insight` binary.

pub mod adapters;
pub mod config;
pub mod console;
pub mod error;
