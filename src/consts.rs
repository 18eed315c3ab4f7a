/// Keypad chatter window in milliseconds
pub const DEBOUNCE_MS: u32 = 20;
/// foreground scan period
pub const SCAN_PERIOD_MS: u64 = 5;
/// background engine period, also the dwell granularity
pub const ENGINE_TICK_MS: u64 = 100;

/// Minimum time between two sensor transactions (datasheet: 1 s)
pub const MEASURE_INTERVAL_MS: u32 = 1_000;
/// Interval the first prototype used; below the datasheet minimum
pub const SOURCE_MEASURE_INTERVAL_MS: u32 = 200;

pub const NATURAL_DWELL_MS: u32 = 1_000;
pub const SLEEP_DWELL_MS: u32 = 2_000;
/// Fan stays off this long after the temperature interlock trips
pub const COOLDOWN_MS: u32 = 10_000;

/// fail-open: nothing trips until a lower limit is chosen
pub const DEFAULT_THRESHOLD_C: u8 = 100;

// single-wire sensor protocol
pub const PRE_START_HIGH_MS: u32 = 10;
pub const START_LOW_MS: u32 = 18;
/// Edges seen from the sensor ack to the end of the last bit
pub const EXPECTED_TRANSITIONS: usize = 84;
/// ack low + ack high
pub const PREAMBLE_PULSES: usize = 2;
pub const DATA_PULSES: usize = 80;
/// A data high pulse longer than this is a `1`
pub const BIT_THRESHOLD_US: u32 = 50;
/// Consecutive unchanged polls before the line counts as idle
pub const MAX_UNCHANGED_POLLS: u32 = 5_000;

/// motor PWM carrier
pub const PWM_FREQ_HZ: u32 = 20_000;
pub const MAX_DUTY_PERCENT: u8 = 100;
