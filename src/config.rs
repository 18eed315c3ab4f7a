use crate::consts;

/// Runtime tunables; defaults come from [`consts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub debounce_ms: u32,
    pub measure_interval_ms: u32,
    pub cooldown_ms: u32,
    pub natural_dwell_ms: u32,
    pub sleep_dwell_ms: u32,
    pub bit_threshold_us: u32,
    pub max_unchanged_polls: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: consts::DEBOUNCE_MS,
            measure_interval_ms: consts::MEASURE_INTERVAL_MS,
            cooldown_ms: consts::COOLDOWN_MS,
            natural_dwell_ms: consts::NATURAL_DWELL_MS,
            sleep_dwell_ms: consts::SLEEP_DWELL_MS,
            bit_threshold_us: consts::BIT_THRESHOLD_US,
            max_unchanged_polls: consts::MAX_UNCHANGED_POLLS,
        }
    }
}

impl Config {
    /// Rejects values that would stall a loop or never let the sensor answer.
    pub fn is_valid(&self) -> bool {
        self.natural_dwell_ms > 0
            && self.sleep_dwell_ms > 0
            && self.bit_threshold_us > 0
            && self.max_unchanged_polls > 0
            && self.measure_interval_ms >= consts::SOURCE_MEASURE_INTERVAL_MS
    }
}
