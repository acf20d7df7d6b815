//! # Telemetry Module
//!
//! Persists received frames to an append-only CSV log.
//!
//! This module handles:
//! - Creating the log file and writing the fixed header row
//! - Appending one flushed row per frame
//! - Reading the log back as typed samples for downstream consumers

pub mod log;
pub mod reader;
