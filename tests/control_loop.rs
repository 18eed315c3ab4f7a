//! Foreground dispatch and background engine working on one shared state,
//! with fake motor, display and sensor.

use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use breeze_firmware::{
    controller::Motor,
    dht::Thermometer,
    dispatch::{dispatch, Effect},
    display::{render_status, StatusDisplay},
    wind::WindEngine,
    Config, ControlState, DecodeError, SensorReading, WindMode,
};

#[derive(Default)]
struct FakeMotor {
    duty: u8,
    history: Vec<u8>,
}

impl Motor for FakeMotor {
    fn set_duty(&mut self, percent: u8) {
        self.duty = percent;
        self.history.push(percent);
    }

    fn enable(&mut self) {}

    fn disable(&mut self) {}
}

#[derive(Default)]
struct FakeScreen {
    lines: Vec<String>,
}

impl StatusDisplay for FakeScreen {
    fn clear(&mut self) {
        self.lines.clear();
    }

    fn draw_text(&mut self, _x: i32, _y: i32, text: &str) {
        self.lines.push(text.into());
    }

    fn flush(&mut self) {}
}

/// Plays back queued results first, then the steady one forever.
struct ScriptedSensor {
    results: VecDeque<Result<SensorReading, DecodeError>>,
    steady: Result<SensorReading, DecodeError>,
}

impl ScriptedSensor {
    fn steady(result: Result<SensorReading, DecodeError>) -> Self {
        Self {
            results: VecDeque::new(),
            steady: result,
        }
    }

    fn first(mut self, result: Result<SensorReading, DecodeError>) -> Self {
        self.results.push_back(result);
        self
    }
}

impl Thermometer for ScriptedSensor {
    fn measure(&mut self, _now_ms: u32) -> Result<SensorReading, DecodeError> {
        self.results.pop_front().unwrap_or(self.steady)
    }
}

fn reading(celsius: u8) -> SensorReading {
    let data = [50, 0, celsius, 0];
    let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    SensorReading::from_bytes([data[0], data[1], data[2], data[3], sum])
}

struct Rig {
    engine: WindEngine,
    motor: FakeMotor,
    screen: FakeScreen,
}

impl Rig {
    fn new() -> Self {
        Self {
            engine: WindEngine::new(&Config::default()),
            motor: FakeMotor::default(),
            screen: FakeScreen::default(),
        }
    }

    fn tick(
        &mut self,
        now_ms: u32,
        sensor: &mut ScriptedSensor,
        port: &mut breeze_firmware::models::EngineWriter<'_>,
    ) {
        let (output, view) = self.engine.tick(now_ms, sensor, port);
        self.motor.set_duty(output.duty);
        render_status(&mut self.screen, &view);
    }
}

#[test]
fn speed_key_without_mode_drives_motor_immediately() {
    let state = ControlState::new();
    let (mut input, mut port) = state.split().unwrap();
    let mut rig = Rig::new();
    let mut sensor = ScriptedSensor::steady(Ok(reading(25)));

    rig.tick(0, &mut sensor, &mut port);
    if let Effect::ApplyDuty(p) = dispatch('2', &mut input) {
        rig.motor.set_duty(p);
    }
    assert_eq!(rig.motor.duty, 60);
}

#[test]
fn speed_key_during_pattern_waits_for_next_step() {
    let state = ControlState::new();
    let (mut input, mut port) = state.split().unwrap();
    let mut rig = Rig::new();
    let mut sensor = ScriptedSensor::steady(Ok(reading(25)));

    dispatch('2', &mut input);
    dispatch('B', &mut input);
    for t in (0..1_500).step_by(100) {
        rig.tick(t, &mut sensor, &mut port);
    }
    // natural pattern is in its "off" second
    assert_eq!(rig.motor.duty, 0);

    assert_eq!(dispatch('1', &mut input), Effect::None);
    assert_eq!(state.snapshot().current_speed, 30);
    assert_eq!(rig.motor.duty, 0);

    rig.tick(1_500, &mut sensor, &mut port);
    assert_eq!(rig.motor.duty, 0);
    rig.tick(2_000, &mut sensor, &mut port);
    assert_eq!(rig.motor.duty, 30);
}

#[test]
fn natural_pattern_cycles_through_the_motor() {
    let state = ControlState::new();
    let (mut input, mut port) = state.split().unwrap();
    let mut rig = Rig::new();
    let mut sensor = ScriptedSensor::steady(Ok(reading(25)));

    dispatch('2', &mut input);
    dispatch('B', &mut input);
    for t in (0..4_000).step_by(100) {
        rig.tick(t, &mut sensor, &mut port);
    }

    let changes: Vec<u8> = rig
        .motor
        .history
        .windows(2)
        .filter(|w| w[0] != w[1])
        .map(|w| w[1])
        .collect();
    assert_eq!(rig.motor.history[0], 60);
    assert_eq!(changes, [0, 60, 0]);
    assert_eq!(rig.screen.lines[1], "Mode: Natural");
}

#[test]
fn overheat_forces_motor_off_and_flags_state() {
    let state = ControlState::new();
    let (mut input, mut port) = state.split().unwrap();
    let mut rig = Rig::new();
    let mut sensor = ScriptedSensor::steady(Ok(reading(25)));

    dispatch('8', &mut input); // 40 C limit
    dispatch('4', &mut input);
    rig.tick(0, &mut sensor, &mut port);
    assert_eq!(rig.motor.duty, 100);

    let mut sensor = ScriptedSensor::steady(Ok(reading(45)));
    rig.tick(100, &mut sensor, &mut port);
    assert_eq!(rig.motor.duty, 0);
    assert!(state.snapshot().interlock);
    assert_eq!(rig.screen.lines[0], "!! OVERHEAT !!");

    // keypad cannot bypass the interlock
    assert_eq!(dispatch('3', &mut input), Effect::None);

    let mut sensor = ScriptedSensor::steady(Ok(reading(30)));
    for t in (200..10_100).step_by(100) {
        rig.tick(t, &mut sensor, &mut port);
        assert_eq!(rig.motor.duty, 0);
    }
    rig.tick(10_100, &mut sensor, &mut port);
    assert_eq!(rig.motor.duty, 80);
    assert!(!state.snapshot().interlock);
    assert_eq!(rig.screen.lines[0], "Speed: 80%");
}

#[test]
fn sensor_failure_keeps_last_reading_and_control_running() {
    let state = ControlState::new();
    let (mut input, mut port) = state.split().unwrap();
    let mut rig = Rig::new();
    let mut sensor = ScriptedSensor::steady(Err(DecodeError::Checksum {
        expected: 1,
        actual: 2,
    }))
    .first(Ok(reading(26)));

    dispatch('A', &mut input);
    dispatch('3', &mut input);
    rig.tick(0, &mut sensor, &mut port);
    assert_eq!(rig.motor.duty, 80);
    assert_eq!(rig.screen.lines[2], "Temp: 26.0C");

    for t in (100..1_000).step_by(100) {
        rig.tick(t, &mut sensor, &mut port);
        assert_eq!(rig.motor.duty, 80);
    }
    assert!(rig.engine.is_stale());
    assert_eq!(state.snapshot().last_temperature, Some(reading(26)));
    assert_eq!(rig.screen.lines[2], "Temp: 26.0C?");
}

#[test]
fn no_reading_ever_keeps_fan_off() {
    let state = ControlState::new();
    let (mut input, mut port) = state.split().unwrap();
    let mut rig = Rig::new();
    let mut sensor = ScriptedSensor::steady(Err(DecodeError::PulseCount { observed: 0 }));

    dispatch('4', &mut input);
    for t in (0..20_000).step_by(100) {
        rig.tick(t, &mut sensor, &mut port);
        assert_eq!(rig.motor.duty, 0);
    }
    assert_eq!(rig.screen.lines[2], "Temp: --?");
    assert_eq!(state.snapshot().wind_mode, WindMode::Unset);
}
