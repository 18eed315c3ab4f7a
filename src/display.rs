//! Status screen: four text lines describing speed, mode, temperature and
//! the interlock limit.

use core::fmt::Write;

use heapless::String;

use crate::models::{SensorReading, Snapshot};

pub const LINE_HEIGHT: i32 = 12;
pub const LINE_WIDTH: usize = 21;

type Line = String<LINE_WIDTH>;

pub trait StatusDisplay {
    fn clear(&mut self);
    fn draw_text(&mut self, x: i32, y: i32, text: &str);
    fn flush(&mut self);
}

/// What the background loop wants on screen this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    pub snapshot: Snapshot,
    pub overheated: bool,
    /// last sensor transaction failed; the shown reading is old
    pub stale: bool,
}

pub fn status_lines(view: &StatusView) -> [Line; 4] {
    let snap = &view.snapshot;
    let mut lines: [Line; 4] = Default::default();

    if view.overheated {
        lines[0].push_str("!! OVERHEAT !!").ok();
    } else {
        write!(lines[0], "Speed: {}%", snap.current_speed).ok();
    }
    write!(lines[1], "Mode: {}", snap.wind_mode.label()).ok();
    write_temperature(&mut lines[2], snap.last_temperature, view.stale);
    write!(lines[3], "Limit: {}C", snap.temp_threshold_celsius).ok();

    lines
}

fn write_temperature(line: &mut Line, reading: Option<SensorReading>, stale: bool) {
    match reading {
        Some(reading) => {
            let t = reading.temperature_tenths();
            write!(line, "Temp: {}.{}C", t / 10, t % 10).ok();
        }
        None => {
            line.push_str("Temp: --").ok();
        }
    }
    if stale {
        line.push('?').ok();
    }
}

pub fn render_status<D: StatusDisplay>(display: &mut D, view: &StatusView) {
    display.clear();
    for (row, line) in status_lines(view).iter().enumerate() {
        display.draw_text(0, row as i32 * LINE_HEIGHT, line);
    }
    display.flush();
}
