//! # Telemetry Ingest Library
//!
//! Receive drone telemetry frames over TCP and persist them to a CSV log.
//!
//! A frame is one line of 11 comma-separated values sent by the flight
//! board: GPS position followed by accelerometer, gyroscope and magnetometer
//! readings. Each connection carries one frame, which is appended as one row
//! to an append-only log. A separate reachability probe checks whether a
//! host/port can be reached.

pub mod config;
pub mod error;
pub mod frame;
pub mod listener;
pub mod probe;
pub mod telemetry;
