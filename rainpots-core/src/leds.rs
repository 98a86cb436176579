//! Button and indicator LEDs.
//!
//! Button LEDs sit behind a shift register and are written as one bitmask.
//! The four indicator LEDs are driven directly and usually show a single
//! position (1-4) or nothing.

use embedded_hal::delay::DelayNs;

use crate::filter::CalibrationPoint;

/// Number of indicator LEDs.
pub const INDICATOR_COUNT: usize = 4;

/// Flash cycles of the mode-change and calibration patterns.
const FLASH_CYCLES: usize = 6;
const FLASH_HALF_PERIOD_MS: u32 = 100;

/// Toggles of the controller-status acknowledgement.
const STATUS_BLINKS: usize = 10;
const STATUS_BLINK_MS: u32 = 80;

/// Output side of the board LEDs.
pub trait LedDriver {
    /// Latch a new button LED mask (bit `i` = button `i`).
    fn set_button_leds(&mut self, mask: u8);

    /// Drive the indicator LEDs.
    fn set_indicator_leds(&mut self, states: [bool; INDICATOR_COUNT]);
}

impl<T: LedDriver + ?Sized> LedDriver for &mut T {
    fn set_button_leds(&mut self, mask: u8) {
        (**self).set_button_leds(mask);
    }

    fn set_indicator_leds(&mut self, states: [bool; INDICATOR_COUNT]) {
        (**self).set_indicator_leds(states);
    }
}

/// Set or clear bit `index` of a button LED mask.
#[inline]
pub fn set_led(mask: &mut u8, index: usize, on: bool) {
    if index >= 8 {
        return;
    }
    if on {
        *mask |= 1 << index;
    } else {
        *mask &= !(1 << index);
    }
}

/// Indicator states showing `position` (1-based, 0 = none).
///
/// Positions past the last LED show nothing. With `inverted` every LED is
/// lit except the selected one.
#[must_use]
pub fn indicator_states(position: u8, inverted: bool) -> [bool; INDICATOR_COUNT] {
    let mut states = [inverted; INDICATOR_COUNT];
    if (1..=INDICATOR_COUNT as u8).contains(&position) {
        states[usize::from(position - 1)] = !inverted;
    }
    states
}

/// Six flashes of all indicators, played on every UI mode change.
pub fn flash_mode_change<L: LedDriver, D: DelayNs>(leds: &mut L, delay: &mut D) {
    flash_indicators(leds, delay, [true; INDICATOR_COUNT]);
}

/// Six flashes of the indicator pair assigned to a calibration point.
pub fn flash_calibration<L: LedDriver, D: DelayNs>(
    leds: &mut L,
    delay: &mut D,
    point: CalibrationPoint,
) {
    let pattern = match point {
        CalibrationPoint::Min => [true, true, false, false],
        CalibrationPoint::Center => [false, true, true, false],
        CalibrationPoint::Max => [false, false, true, true],
    };
    flash_indicators(leds, delay, pattern);
}

fn flash_indicators<L: LedDriver, D: DelayNs>(
    leds: &mut L,
    delay: &mut D,
    pattern: [bool; INDICATOR_COUNT],
) {
    for _ in 0..FLASH_CYCLES {
        leds.set_indicator_leds(pattern);
        delay.delay_ms(FLASH_HALF_PERIOD_MS);
        leds.set_indicator_leds([false; INDICATOR_COUNT]);
        delay.delay_ms(FLASH_HALF_PERIOD_MS);
    }
}

/// Toggle button LED 0 ten times on top of `mask`, acknowledging a
/// controller status update. Leaves LED 0 off.
pub fn blink_status<L: LedDriver, D: DelayNs>(leds: &mut L, delay: &mut D, mut mask: u8) {
    let mut on = true;
    for _ in 0..STATUS_BLINKS {
        set_led(&mut mask, 0, on);
        leds.set_button_leds(mask);
        delay.delay_ms(STATUS_BLINK_MS);
        on = !on;
    }
}

#[cfg(test)]
pub(crate) mod mock {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum LedWrite {
        Buttons(u8),
        Indicators([bool; INDICATOR_COUNT]),
    }

    /// Records every write.
    #[derive(Default)]
    pub struct RecordingLeds {
        pub writes: Vec<LedWrite>,
    }

    impl RecordingLeds {
        pub fn last_buttons(&self) -> Option<u8> {
            self.writes.iter().rev().find_map(|w| match w {
                LedWrite::Buttons(mask) => Some(*mask),
                LedWrite::Indicators(_) => None,
            })
        }

        pub fn last_indicators(&self) -> Option<[bool; INDICATOR_COUNT]> {
            self.writes.iter().rev().find_map(|w| match w {
                LedWrite::Indicators(states) => Some(*states),
                LedWrite::Buttons(_) => None,
            })
        }
    }

    impl LedDriver for RecordingLeds {
        fn set_button_leds(&mut self, mask: u8) {
            self.writes.push(LedWrite::Buttons(mask));
        }

        fn set_indicator_leds(&mut self, states: [bool; INDICATOR_COUNT]) {
            self.writes.push(LedWrite::Indicators(states));
        }
    }

    /// Sums requested delays instead of sleeping.
    #[derive(Default)]
    pub struct CountingDelay {
        pub total_ns: u64,
    }

    impl CountingDelay {
        pub fn total_ms(&self) -> u64 {
            self.total_ns / 1_000_000
        }
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }
}
