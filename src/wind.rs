//! Background wind pattern engine.
//!
//! Called once per engine tick. Each call re-reads the shared state, so a
//! speed or mode change from the keypad is picked up on the next tick and a
//! dwell step never outlives a mode change by more than one tick.

use crate::config::Config;
use crate::display::StatusView;
use crate::dht::Thermometer;
use crate::models::{EngineWriter, Snapshot, WindMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineOutput {
    pub duty: u8,
    pub overheated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    CoolingDown { since_ms: u32 },
}

/// One dwell step of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    mode: WindMode,
    on: bool,
    since_ms: u32,
}

pub struct WindEngine {
    natural_dwell_ms: u32,
    sleep_dwell_ms: u32,
    cooldown_ms: u32,
    phase: Phase,
    step: Option<Step>,
    stale: bool,
}

impl WindEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            natural_dwell_ms: config.natural_dwell_ms,
            sleep_dwell_ms: config.sleep_dwell_ms,
            cooldown_ms: config.cooldown_ms,
            phase: Phase::Running,
            step: None,
            stale: false,
        }
    }

    /// Whether the last sensor transaction failed.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Reads the sensor and publishes good readings. Failures keep the last
    /// good reading in place and are retried next tick.
    pub fn sample<T: Thermometer>(
        &mut self,
        now_ms: u32,
        sensor: &mut T,
        port: &mut EngineWriter<'_>,
    ) {
        match sensor.measure(now_ms) {
            Ok(reading) => {
                port.publish(reading);
                self.stale = false;
            }
            Err(e) => {
                warn!("sensor read failed: {}", e);
                self.stale = true;
            }
        }
    }

    /// Duty for this tick, with the temperature interlock applied.
    pub fn poll(&mut self, now_ms: u32, snap: &Snapshot) -> EngineOutput {
        if let Phase::CoolingDown { since_ms } = self.phase {
            if now_ms.wrapping_sub(since_ms) < self.cooldown_ms {
                return EngineOutput {
                    duty: 0,
                    overheated: true,
                };
            }
        }

        let too_hot = match snap.last_temperature {
            Some(reading) => reading.exceeds(snap.temp_threshold_celsius),
            None => true,
        };

        if too_hot {
            if self.phase == Phase::Running {
                warn!(
                    "interlock engaged, limit {=u8}C",
                    snap.temp_threshold_celsius
                );
            }
            self.phase = Phase::CoolingDown { since_ms: now_ms };
            self.step = None;
            return EngineOutput {
                duty: 0,
                overheated: true,
            };
        }

        if self.phase != Phase::Running {
            info!("interlock released");
            self.phase = Phase::Running;
        }

        EngineOutput {
            duty: self.pattern_duty(now_ms, snap),
            overheated: false,
        }
    }

    /// Sample, evaluate and publish the interlock flag; the caller applies
    /// the duty and renders the view.
    pub fn tick<T: Thermometer>(
        &mut self,
        now_ms: u32,
        sensor: &mut T,
        port: &mut EngineWriter<'_>,
    ) -> (EngineOutput, StatusView) {
        self.sample(now_ms, sensor, port);
        let snapshot = port.state().snapshot();
        let output = self.poll(now_ms, &snapshot);
        if snapshot.interlock != output.overheated {
            port.set_interlock(output.overheated);
        }

        let view = StatusView {
            snapshot,
            overheated: output.overheated,
            stale: self.stale,
        };
        (output, view)
    }

    fn dwell_ms(&self, mode: WindMode) -> Option<u32> {
        match mode {
            WindMode::Natural => Some(self.natural_dwell_ms),
            WindMode::Sleep => Some(self.sleep_dwell_ms),
            WindMode::Normal | WindMode::Unset => None,
        }
    }

    fn pattern_duty(&mut self, now_ms: u32, snap: &Snapshot) -> u8 {
        let mut step = match self.step {
            Some(step) if step.mode == snap.wind_mode => step,
            _ => Step {
                mode: snap.wind_mode,
                on: true,
                since_ms: now_ms,
            },
        };

        if let Some(dwell) = self.dwell_ms(step.mode) {
            if now_ms.wrapping_sub(step.since_ms) >= dwell {
                step.on = !step.on;
                step.since_ms = now_ms;
            }
        }
        self.step = Some(step);

        if step.on {
            snap.current_speed
        } else {
            0
        }
    }
}
