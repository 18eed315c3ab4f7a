//! Bit-banged single-wire humidity/temperature sensor (DHT11 framing).
//!
//! # Protocol
//!
//! ```txt
//!   host start        ack          bit 0            bit 1  ...   end
//! ──┐         ┌──┐      ┌──────┐      ┌───┐      ┌───────┐      ┌───
//!   │  >=18ms │  │ 80us │ 80us │ 50us │26 │ 50us │  70us │ 50us │
//!   └─────────┘  └──────┘      └──────┘   └──────┘       └──────┘
//! ```
//!
//! The host holds the line low for at least 18 ms, releases it, then times
//! every edge. A full frame is 84 edges: the 80 µs ack pair, 40 bits of
//! (low, high) pulses, and the trailing low. A data high pulse longer than
//! 50 µs is a `1`. Bytes arrive big-endian: humidity, humidity tenths,
//! temperature, temperature tenths, checksum.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::{InputPin, OutputPin};
use heapless::Vec;

use crate::config::Config;
use crate::consts::{
    DATA_PULSES, EXPECTED_TRANSITIONS, PREAMBLE_PULSES, PRE_START_HIGH_MS,
    START_LOW_MS,
};
use crate::models::SensorReading;
use crate::{DecodeError, Result};

/// Free-running counter used to time edges (DWT cycle counter on device).
pub trait Stopwatch {
    fn ticks(&self) -> u32;
    fn ticks_per_us(&self) -> u32;
}

/// Anything that can produce a reading on demand.
pub trait Thermometer {
    fn measure(&mut self, now_ms: u32) -> Result<SensorReading>;
}

/// Pulse widths in µs between consecutive edges of one transaction.
#[derive(Debug, Clone, Default)]
pub struct PulseCapture {
    pulses: Vec<u16, EXPECTED_TRANSITIONS>,
    transitions: usize,
}

impl PulseCapture {
    /// Rebuilds a capture from recorded pulse widths; every width sits
    /// between two edges.
    pub fn from_pulses(pulses: &[u16]) -> Self {
        let mut capture = Self::default();
        for &width in pulses.iter().take(EXPECTED_TRANSITIONS) {
            capture.pulses.push(width).ok();
        }
        capture.transitions = pulses.len() + 1;
        capture
    }

    pub fn transitions(&self) -> usize {
        self.transitions
    }

    pub fn pulses(&self) -> &[u16] {
        &self.pulses
    }
}

/// Polls `pin` in a tight loop, timing every edge, until the line has been
/// quiet for more than `max_unchanged` polls or more edges than a frame holds
/// have been seen.
///
/// Edges are only counted once the released line has been pulled high, so
/// a slow pull-up rise is not mistaken for the first edge. A line that never
/// rises within `max_unchanged` polls gives an empty capture.
///
/// Must run with interrupts masked; a missed edge shifts every later bit.
pub fn capture<P, S>(pin: &P, clock: &S, max_unchanged: u32) -> PulseCapture
where
    P: InputPin,
    S: Stopwatch,
{
    let ticks_per_us = clock.ticks_per_us().max(1);
    let mut capture = PulseCapture::default();
    if !wait_for_release(pin, max_unchanged) {
        return capture;
    }

    let mut level = true;
    let mut last_edge: Option<u32> = None;
    let mut unchanged = 0u32;

    loop {
        let current = pin.is_high().unwrap_or(false);
        if current == level {
            unchanged += 1;
            if unchanged > max_unchanged {
                break;
            }
            continue;
        }

        let now = clock.ticks();
        level = current;
        unchanged = 0;
        capture.transitions += 1;

        if let Some(prev) = last_edge {
            let width = now.wrapping_sub(prev) / ticks_per_us;
            capture.pulses.push(width.min(u32::from(u16::MAX)) as u16).ok();
        }
        last_edge = Some(now);

        if capture.transitions > EXPECTED_TRANSITIONS {
            break;
        }
    }

    capture
}

fn wait_for_release<P: InputPin>(pin: &P, max_polls: u32) -> bool {
    for _ in 0..=max_polls {
        if pin.is_high().unwrap_or(false) {
            return true;
        }
    }
    false
}

/// Packs the 40 data bits big-endian, without checking anything.
pub fn decode_bits(data: &[u16], bit_threshold_us: u32) -> [u8; 5] {
    let mut bytes = [0u8; 5];
    for (bit, pair) in data.chunks_exact(2).take(40).enumerate() {
        if u32::from(pair[1]) > bit_threshold_us {
            bytes[bit / 8] |= 0x80 >> (bit % 8);
        }
    }
    bytes
}

pub fn decode(capture: &PulseCapture, bit_threshold_us: u32) -> Result<SensorReading> {
    if capture.transitions != EXPECTED_TRANSITIONS {
        return Err(DecodeError::PulseCount {
            observed: capture.transitions,
        });
    }

    let data = &capture.pulses[PREAMBLE_PULSES..PREAMBLE_PULSES + DATA_PULSES];
    let reading = SensorReading::from_bytes(decode_bits(data, bit_threshold_us));

    let expected = reading.expected_checksum();
    if expected != reading.checksum_byte {
        return Err(DecodeError::Checksum {
            expected,
            actual: reading.checksum_byte,
        });
    }

    Ok(reading)
}

/// Sensor on an open-drain data pin: writing high releases the line to the
/// pull-up, which is the listening phase.
pub struct Dht<P, D, S> {
    pin: P,
    delay: D,
    clock: S,
    interval_ms: u32,
    bit_threshold_us: u32,
    max_unchanged: u32,
    last_good: Option<(u32, SensorReading)>,
}

impl<P, D, S> Dht<P, D, S>
where
    P: InputPin + OutputPin,
    D: DelayMs<u32>,
    S: Stopwatch,
{
    pub fn new(mut pin: P, delay: D, clock: S, config: &Config) -> Self {
        pin.set_high().ok();
        Self {
            pin,
            delay,
            clock,
            interval_ms: config.measure_interval_ms,
            bit_threshold_us: config.bit_threshold_us,
            max_unchanged: config.max_unchanged_polls,
            last_good: None,
        }
    }

    /// Last successful reading, if any.
    pub fn last_reading(&self) -> Option<SensorReading> {
        self.last_good.map(|(_, reading)| reading)
    }

    /// Runs one transaction, unless the previous good reading is younger
    /// than the configured interval, in which case that reading is returned.
    pub fn measure(&mut self, now_ms: u32) -> Result<SensorReading> {
        if let Some((taken_at, reading)) = self.last_good {
            if now_ms.wrapping_sub(taken_at) < self.interval_ms {
                return Ok(reading);
            }
        }

        self.pin.set_high().ok();
        self.delay.delay_ms(PRE_START_HIGH_MS);
        self.pin.set_low().ok();
        self.delay.delay_ms(START_LOW_MS);

        let pin = &mut self.pin;
        let clock = &self.clock;
        let max_unchanged = self.max_unchanged;
        // Masks the SysTick monotonic too: ticks that fall due during the
        // capture (a few ms per read) are lost, so scheduler time runs up to
        // that much slow per measure interval.
        let capture = critical_section::with(|_| {
            pin.set_high().ok();
            capture(&*pin, clock, max_unchanged)
        });
        trace!("dht: {=usize} transitions", capture.transitions());

        let reading = decode(&capture, self.bit_threshold_us)?;
        debug!("dht: {}", reading);
        self.last_good = Some((now_ms, reading));
        Ok(reading)
    }
}

impl<P, D, S> Thermometer for Dht<P, D, S>
where
    P: InputPin + OutputPin,
    D: DelayMs<u32>,
    S: Stopwatch,
{
    fn measure(&mut self, now_ms: u32) -> Result<SensorReading> {
        Dht::measure(self, now_ms)
    }
}
