#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod config;
pub mod consts;
pub mod controller;
pub mod dht;
pub mod dispatch;
pub mod display;
pub mod keypad;
pub mod models;
pub mod wind;

pub use config::Config;
pub use models::{ControlState, SensorReading, Snapshot, WindMode};

/// Result type used by the sensor path.
pub type Result<T> = ::core::result::Result<T, DecodeError>;

/// Sensor transaction failures. Both are transient: keep the last good
/// reading and try again next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Edge count differs from a full frame (sensor absent, glitch, or a
    /// missed edge).
    PulseCount { observed: usize },
    /// Decoded bytes do not add up to the checksum byte.
    Checksum { expected: u8, actual: u8 },
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::PulseCount { observed } => write!(
                f,
                "expected {} transitions, saw {}",
                consts::EXPECTED_TRANSITIONS,
                observed
            ),
            DecodeError::Checksum { expected, actual } => {
                write!(f, "checksum {:#04x}, expected {:#04x}", actual, expected)
            }
        }
    }
}
