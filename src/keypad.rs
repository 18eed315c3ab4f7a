//! Debounced matrix keypad scanner.
//!
//! Rows are driven one at a time; columns are sampled in order and the first
//! active column wins. After a detection nothing is scanned again until the
//! debounce window has passed.

use embedded_hal::digital::v2::{InputPin, OutputPin};

pub const ROWS: usize = 4;
pub const COLS: usize = 4;

pub const KEYMAP: [[char; COLS]; ROWS] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// Electrical level that means "selected" on a row and "pressed" on a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Pull-down columns, rows driven high.
    ActiveHigh,
    /// Pull-up columns, rows driven low.
    ActiveLow,
}

pub struct Keypad<R, C, const NR: usize = ROWS, const NC: usize = COLS> {
    rows: [R; NR],
    cols: [C; NC],
    keymap: [[char; NC]; NR],
    polarity: Polarity,
    debounce_ms: u32,
    last_press_ms: Option<u32>,
}

impl<R, C, const NR: usize, const NC: usize> Keypad<R, C, NR, NC>
where
    R: OutputPin,
    C: InputPin,
{
    pub fn new(
        rows: [R; NR],
        cols: [C; NC],
        keymap: [[char; NC]; NR],
        polarity: Polarity,
        debounce_ms: u32,
    ) -> Self {
        let mut keypad = Self {
            rows,
            cols,
            keymap,
            polarity,
            debounce_ms,
            last_press_ms: None,
        };
        for row in 0..NR {
            keypad.release(row);
        }
        keypad
    }

    /// Returns the first pressed key, or `None`. `now_ms` is a wrapping
    /// millisecond counter.
    pub fn scan(&mut self, now_ms: u32) -> Option<char> {
        if let Some(last) = self.last_press_ms {
            if now_ms.wrapping_sub(last) < self.debounce_ms {
                return None;
            }
        }

        for row in 0..NR {
            self.select(row);
            for col in 0..NC {
                if self.is_pressed(col) {
                    self.last_press_ms = Some(now_ms);
                    self.release(row);
                    return Some(self.keymap[row][col]);
                }
            }
            self.release(row);
        }

        None
    }

    pub fn last_press_ms(&self) -> Option<u32> {
        self.last_press_ms
    }

    fn select(&mut self, row: usize) {
        match self.polarity {
            Polarity::ActiveHigh => self.rows[row].set_high().ok(),
            Polarity::ActiveLow => self.rows[row].set_low().ok(),
        };
    }

    fn release(&mut self, row: usize) {
        match self.polarity {
            Polarity::ActiveHigh => self.rows[row].set_low().ok(),
            Polarity::ActiveLow => self.rows[row].set_high().ok(),
        };
    }

    fn is_pressed(&self, col: usize) -> bool {
        match self.polarity {
            Polarity::ActiveHigh => self.cols[col].is_high().unwrap_or(false),
            Polarity::ActiveLow => self.cols[col].is_low().unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::cell::Cell;
    use core::convert::Infallible;
    use std::rc::Rc;
    use std::vec;
    use std::vec::Vec;

    use embedded_hal_mock::pin::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    /// Shared wiring: which row is currently selected and which cell is held.
    #[derive(Default)]
    struct Matrix {
        selected: Cell<Option<usize>>,
        held: Cell<Option<(usize, usize)>>,
        reads: Cell<usize>,
    }

    struct RowPin {
        index: usize,
        polarity: Polarity,
        matrix: Rc<Matrix>,
    }

    impl OutputPin for RowPin {
        type Error = Infallible;

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.drive(true);
            Ok(())
        }

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.drive(false);
            Ok(())
        }
    }

    impl RowPin {
        fn drive(&self, high: bool) {
            let active = high == (self.polarity == Polarity::ActiveHigh);
            if active {
                self.matrix.selected.set(Some(self.index));
            } else if self.matrix.selected.get() == Some(self.index) {
                self.matrix.selected.set(None);
            }
        }
    }

    struct ColPin {
        index: usize,
        polarity: Polarity,
        matrix: Rc<Matrix>,
    }

    impl ColPin {
        fn active(&self) -> bool {
            self.matrix.reads.set(self.matrix.reads.get() + 1);
            match (self.matrix.selected.get(), self.matrix.held.get()) {
                (Some(row), Some((r, c))) => row == r && c == self.index,
                _ => false,
            }
        }
    }

    impl InputPin for ColPin {
        type Error = Infallible;

        fn is_high(&self) -> Result<bool, Infallible> {
            let active = self.active();
            Ok(active == (self.polarity == Polarity::ActiveHigh))
        }

        fn is_low(&self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    fn wired(polarity: Polarity) -> (Keypad<RowPin, ColPin>, Rc<Matrix>) {
        let matrix = Rc::new(Matrix::default());
        let rows = core::array::from_fn(|index| RowPin {
            index,
            polarity,
            matrix: matrix.clone(),
        });
        let cols = core::array::from_fn(|index| ColPin {
            index,
            polarity,
            matrix: matrix.clone(),
        });
        (Keypad::new(rows, cols, KEYMAP, polarity, 20), matrix)
    }

    #[test]
    fn every_cell_maps_to_its_symbol() {
        for polarity in [Polarity::ActiveHigh, Polarity::ActiveLow] {
            for row in 0..ROWS {
                for col in 0..COLS {
                    let (mut keypad, matrix) = wired(polarity);
                    matrix.held.set(Some((row, col)));
                    assert_eq!(keypad.scan(1_000), Some(KEYMAP[row][col]));
                    // row was released after the hit
                    assert_eq!(matrix.selected.get(), None);
                }
            }
        }
    }

    #[test]
    fn nothing_pressed_returns_none() {
        let (mut keypad, matrix) = wired(Polarity::ActiveLow);
        assert_eq!(keypad.scan(0), None);
        assert_eq!(matrix.reads.get(), ROWS * COLS);
        assert_eq!(keypad.last_press_ms(), None);
    }

    #[test]
    fn debounce_window_skips_scanning_entirely() {
        let (mut keypad, matrix) = wired(Polarity::ActiveLow);
        matrix.held.set(Some((1, 2)));
        assert_eq!(keypad.scan(100), Some('6'));

        let reads = matrix.reads.get();
        for dt in [0, 1, 10, 19] {
            assert_eq!(keypad.scan(100 + dt), None);
        }
        assert_eq!(matrix.reads.get(), reads);
    }

    #[test]
    fn held_key_repeats_only_after_window() {
        let (mut keypad, matrix) = wired(Polarity::ActiveHigh);
        matrix.held.set(Some((0, 0)));
        assert_eq!(keypad.scan(0), Some('1'));
        assert_eq!(keypad.scan(10), None);
        assert_eq!(keypad.scan(20), Some('1'));
        assert_eq!(keypad.last_press_ms(), Some(20));
    }

    #[test]
    fn debounce_survives_counter_wrap() {
        let (mut keypad, matrix) = wired(Polarity::ActiveLow);
        matrix.held.set(Some((3, 3)));
        assert_eq!(keypad.scan(u32::MAX - 5), Some('D'));
        assert_eq!(keypad.scan(3), None);
        assert_eq!(keypad.scan(15), Some('D'));
    }

    #[test]
    fn first_row_then_first_column_wins() {
        // Scripted pins: row 0 has nothing, row 1 has column 1 active.
        let low = PinState::Low;
        let high = PinState::High;
        let scanned_row = [
            PinTransaction::set(high),
            PinTransaction::set(low),
            PinTransaction::set(high),
        ];
        let row_handles: Vec<PinMock> = vec![
            PinMock::new(&scanned_row),
            PinMock::new(&scanned_row),
            PinMock::new(&[PinTransaction::set(high)]),
            PinMock::new(&[PinTransaction::set(high)]),
        ];
        let col_handles: Vec<PinMock> = vec![
            PinMock::new(&[PinTransaction::get(high), PinTransaction::get(high)]),
            PinMock::new(&[PinTransaction::get(high), PinTransaction::get(low)]),
            PinMock::new(&[PinTransaction::get(high)]),
            PinMock::new(&[PinTransaction::get(high)]),
        ];

        let rows: [PinMock; ROWS] =
            core::array::from_fn(|i| row_handles[i].clone());
        let cols: [PinMock; COLS] =
            core::array::from_fn(|i| col_handles[i].clone());

        let mut keypad =
            Keypad::new(rows, cols, KEYMAP, Polarity::ActiveLow, 20);
        assert_eq!(keypad.scan(50), Some('5'));

        for mut pin in row_handles.into_iter().chain(col_handles) {
            pin.done();
        }
    }
}
