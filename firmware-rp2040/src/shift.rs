//! Bit-banged shift registers: 74HC165 for the buttons, 74HC595 for the
//! button LEDs.

use embassy_rp::gpio::{Input, Level, Output};
use rainpots_core::{LedDriver, INDICATOR_COUNT};

/// Bits clocked per register.
const REGISTER_BITS: u32 = 8;

/// Settle time around clock edges, in CPU cycles.
const EDGE_CYCLES: u32 = 16;

#[inline]
fn settle() {
    cortex_m::asm::delay(EDGE_CYCLES);
}

/// 74HC165 parallel-in shift register.
///
/// The first bit clocked out is button 0. A set bit means pressed.
pub struct ButtonShiftIn<'d> {
    load: Output<'d>,
    clock: Output<'d>,
    data: Input<'d>,
}

impl<'d> ButtonShiftIn<'d> {
    pub fn new(load: Output<'d>, clock: Output<'d>, data: Input<'d>) -> Self {
        Self { load, clock, data }
    }

    /// Latch the inputs and shift them in.
    pub fn read(&mut self) -> u32 {
        self.load.set_low();
        settle();
        self.load.set_high();
        settle();

        let mut raw = 0u32;
        for bit in 0..REGISTER_BITS {
            if self.data.is_high() {
                raw |= 1 << bit;
            }
            self.clock.set_high();
            settle();
            self.clock.set_low();
            settle();
        }
        raw
    }
}

/// 74HC595 serial-in shift register.
pub struct LedShiftOut<'d> {
    latch: Output<'d>,
    clock: Output<'d>,
    data: Output<'d>,
}

impl<'d> LedShiftOut<'d> {
    pub fn new(latch: Output<'d>, clock: Output<'d>, data: Output<'d>) -> Self {
        Self { latch, clock, data }
    }

    /// Shift out `mask` MSB first and latch it, so bit 0 lands on output Q0.
    pub fn write(&mut self, mask: u8) {
        self.latch.set_low();
        for bit in (0..REGISTER_BITS).rev() {
            self.data.set_level(Level::from(mask & (1 << bit) != 0));
            settle();
            self.clock.set_high();
            settle();
            self.clock.set_low();
        }
        self.latch.set_high();
        settle();
        self.latch.set_low();
    }
}

/// Button LEDs behind the 74HC595 plus the four indicator GPIOs.
pub struct BoardLeds<'d> {
    buttons: LedShiftOut<'d>,
    indicators: [Output<'d>; INDICATOR_COUNT],
}

impl<'d> BoardLeds<'d> {
    pub fn new(buttons: LedShiftOut<'d>, indicators: [Output<'d>; INDICATOR_COUNT]) -> Self {
        Self {
            buttons,
            indicators,
        }
    }
}

impl LedDriver for BoardLeds<'_> {
    fn set_button_leds(&mut self, mask: u8) {
        self.buttons.write(mask);
    }

    fn set_indicator_leds(&mut self, states: [bool; INDICATOR_COUNT]) {
        for (led, on) in self.indicators.iter_mut().zip(states) {
            led.set_level(Level::from(on));
        }
    }
}
