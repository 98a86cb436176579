//! Board identity and the power-on LED sequence.

use embassy_rp::gpio::Input;
use embassy_time::Timer;
use rainpots_core::{LedDriver, INDICATOR_COUNT};

const STEP_MS: u64 = 200;
const INDEX_DISPLAY_MS: u64 = 1000;

/// Read the board id from the four jumpers (bit 0 first). A fitted jumper
/// pulls its input low and sets the bit.
pub fn read_board_index(jumpers: &[Input<'_>; 4]) -> u8 {
    jumpers
        .iter()
        .enumerate()
        .filter(|(_, jumper)| jumper.is_low())
        .fold(0u8, |index, (bit, _)| index | (1 << bit))
}

/// Indicator states showing the low four bits of `board`.
#[must_use]
pub fn board_index_pattern(board: u8) -> [bool; INDICATOR_COUNT] {
    core::array::from_fn(|bit| board & (1 << bit) != 0)
}

/// Light the indicators one by one, clear them one by one, show the board
/// index for a second and flash everything once.
pub async fn play_startup_sequence<L: LedDriver>(leds: &mut L, board: u8) {
    let mut states = [false; INDICATOR_COUNT];

    for index in 0..INDICATOR_COUNT {
        states[index] = true;
        leds.set_indicator_leds(states);
        Timer::after_millis(STEP_MS).await;
    }
    Timer::after_millis(STEP_MS).await;
    for index in 0..INDICATOR_COUNT {
        states[index] = false;
        leds.set_indicator_leds(states);
        Timer::after_millis(STEP_MS).await;
    }

    leds.set_indicator_leds(board_index_pattern(board));
    Timer::after_millis(INDEX_DISPLAY_MS).await;

    leds.set_indicator_leds([true; INDICATOR_COUNT]);
    Timer::after_millis(STEP_MS).await;
    leds.set_indicator_leds([false; INDICATOR_COUNT]);
}
