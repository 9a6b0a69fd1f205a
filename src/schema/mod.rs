//! Unified orb.sensor_reading.v1 schema
//!
//! This module defines the sparse input format for streamed sensor readings
//! and its parsing, validation and conversion into engine samples.

mod reading;

pub use reading::*;
