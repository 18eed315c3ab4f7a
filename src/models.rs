//! Appliance state shared by the foreground (keypad) and background (wind
//! engine) contexts.
//!
//! Every field has exactly one writer. [`ControlState::split`] hands out the
//! two writer handles once; everyone else only reads through
//! [`ControlState::snapshot`]. Fields are independent atomics, so a snapshot
//! may mix a fresh speed with a stale mode for one engine tick. The engine
//! re-reads on every tick, which is enough to self-correct.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::consts::DEFAULT_THRESHOLD_C;

/// Speeds reachable from the keypad, in percent.
pub const SPEED_LEVELS: [u8; 5] = [0, 30, 60, 80, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WindMode {
    Unset = 0,
    Normal = 1,
    Natural = 2,
    Sleep = 3,
}

impl WindMode {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => WindMode::Normal,
            2 => WindMode::Natural,
            3 => WindMode::Sleep,
            _ => WindMode::Unset,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WindMode::Unset => "unset",
            WindMode::Normal => "Normal",
            WindMode::Natural => "Natural",
            WindMode::Sleep => "Sleep",
        }
    }
}

/// One decoded sensor frame: humidity and temperature as integer + tenths,
/// followed by the checksum byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorReading {
    pub humidity_integer: u8,
    pub humidity_decimal: u8,
    pub temperature_integer: u8,
    pub temperature_decimal: u8,
    pub checksum_byte: u8,
}

impl SensorReading {
    pub fn from_bytes(bytes: [u8; 5]) -> Self {
        Self {
            humidity_integer: bytes[0],
            humidity_decimal: bytes[1],
            temperature_integer: bytes[2],
            temperature_decimal: bytes[3],
            checksum_byte: bytes[4],
        }
    }

    pub fn data_bytes(&self) -> [u8; 4] {
        [
            self.humidity_integer,
            self.humidity_decimal,
            self.temperature_integer,
            self.temperature_decimal,
        ]
    }

    /// Low byte of the sum of the four data bytes.
    pub fn expected_checksum(&self) -> u8 {
        self.data_bytes()
            .iter()
            .fold(0u8, |acc, b| acc.wrapping_add(*b))
    }

    pub fn temperature_tenths(&self) -> i16 {
        i16::from(self.temperature_integer) * 10
            + i16::from(self.temperature_decimal.min(9))
    }

    pub fn humidity_tenths(&self) -> u16 {
        u16::from(self.humidity_integer) * 10
            + u16::from(self.humidity_decimal.min(9))
    }

    /// At or above the limit counts as too hot.
    pub fn exceeds(&self, threshold_c: u8) -> bool {
        self.temperature_tenths() >= i16::from(threshold_c) * 10
    }

    fn pack(&self) -> u32 {
        u32::from_be_bytes(self.data_bytes())
    }

    fn unpack(raw: u32) -> Self {
        let [h, hd, t, td] = raw.to_be_bytes();
        let mut reading = Self::from_bytes([h, hd, t, td, 0]);
        reading.checksum_byte = reading.expected_checksum();
        reading
    }
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.temperature_tenths();
        let h = self.humidity_tenths();
        write!(f, "{}.{}C {}.{}%", t / 10, t % 10, h / 10, h % 10)
    }
}

/// Point-in-time view of [`ControlState`], read field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub current_speed: u8,
    pub wind_mode: WindMode,
    pub temp_threshold_celsius: u8,
    pub last_temperature: Option<SensorReading>,
    pub interlock: bool,
}

pub struct ControlState {
    current_speed: AtomicU8,
    wind_mode: AtomicU8,
    temp_threshold_celsius: AtomicU8,
    last_reading: AtomicU32,
    has_reading: AtomicBool,
    interlock: AtomicBool,
    split: AtomicBool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlState {
    pub const fn new() -> Self {
        Self {
            current_speed: AtomicU8::new(0),
            wind_mode: AtomicU8::new(WindMode::Unset as u8),
            temp_threshold_celsius: AtomicU8::new(DEFAULT_THRESHOLD_C),
            last_reading: AtomicU32::new(0),
            has_reading: AtomicBool::new(false),
            interlock: AtomicBool::new(false),
            split: AtomicBool::new(false),
        }
    }

    /// Hands out the writer for each context. Only the first call succeeds.
    pub fn split(&self) -> Option<(InputWriter<'_>, EngineWriter<'_>)> {
        if self.split.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some((InputWriter { state: self }, EngineWriter { state: self }))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            current_speed: self.current_speed.load(Ordering::Acquire),
            wind_mode: WindMode::from_u8(self.wind_mode.load(Ordering::Acquire)),
            temp_threshold_celsius: self
                .temp_threshold_celsius
                .load(Ordering::Acquire),
            last_temperature: self.last_temperature(),
            interlock: self.interlock.load(Ordering::Acquire),
        }
    }

    fn last_temperature(&self) -> Option<SensorReading> {
        // flag first: once set, the packed word always holds a full reading
        if !self.has_reading.load(Ordering::Acquire) {
            return None;
        }
        Some(SensorReading::unpack(
            self.last_reading.load(Ordering::Acquire),
        ))
    }
}

/// Foreground writer: speed, wind mode and temperature limit.
pub struct InputWriter<'a> {
    state: &'a ControlState,
}

impl<'a> InputWriter<'a> {
    pub fn set_speed(&mut self, percent: u8) {
        self.state.current_speed.store(percent, Ordering::Release);
    }

    pub fn set_mode(&mut self, mode: WindMode) {
        self.state.wind_mode.store(mode as u8, Ordering::Release);
    }

    pub fn set_threshold(&mut self, celsius: u8) {
        self.state
            .temp_threshold_celsius
            .store(celsius, Ordering::Release);
    }

    pub fn state(&self) -> &'a ControlState {
        self.state
    }
}

/// Background writer: last good sensor reading and the interlock flag.
pub struct EngineWriter<'a> {
    state: &'a ControlState,
}

impl<'a> EngineWriter<'a> {
    /// Swaps the whole reading in with one store, then marks it present.
    pub fn publish(&mut self, reading: SensorReading) {
        self.state.last_reading.store(reading.pack(), Ordering::Release);
        self.state.has_reading.store(true, Ordering::Release);
    }

    pub fn set_interlock(&mut self, engaged: bool) {
        self.state.interlock.store(engaged, Ordering::Release);
    }

    pub fn state(&self) -> &'a ControlState {
        self.state
    }
}
