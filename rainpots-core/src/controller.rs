//! Controller state machine.
//!
//! [`Controller`] owns everything the sampling loop mutates: button modes
//! and values, the two knob banks, the persisted configuration and the
//! LEDs. Outbound [`ControlEvent`]s are queued in a small outbox that the
//! caller drains with [`Controller::pop_event`] after every call.
//!
//! Nothing here returns an error. Storage and ADC failures are logged and
//! the controller keeps running on its in-memory state.

use embedded_hal::delay::DelayNs;
use heapless::Deque;
use rainpots_proto::{CommandCode, CommandFrame, BUTTON_VALUE_UNCHANGED, VALUE_MAX};

use crate::filter::{AnalogSource, CalibrationPoint, PotBank};
use crate::leds::{self, indicator_states, set_led, LedDriver};
use crate::storage::{CalibrationStore, Storage, StorageError};
use crate::timer::{ButtonDebouncer, LongPressTimer};
use crate::types::{
    ControlEvent, ControllerConfig, ControllerMode, ControllerStatus, GlobalSettings, UiMode,
    BANK_CHANNELS, BUTTON_COUNT, CONTROLLER_COUNT, INCREMENT_BUTTON, RADIO_GROUP_FIRST,
    RADIO_GROUP_LAST,
};

/// Outbox depth. A single call queues at most eight events (one per knob).
pub const OUTBOX_CAPACITY: usize = 16;

/// Buttons with long-press tracking.
const LONG_PRESS_BUTTONS: usize = 2;

/// Number of `CONTROLLER_MODE` payload bytes carrying per-button modes.
const MODE_BYTES: usize = BUTTON_COUNT;

const MODE_SETTLE_MS: u32 = 200;
const STEPS_DISPLAY_MS: u32 = 300;
const BUTTON_CONFIG_GAP_MS: u32 = 30;
const CONFIG_EXIT_MS: u32 = 100;

fn log_write(result: Result<(), StorageError>) {
    if let Err(e) = result {
        warn!("configuration write failed: {}", e);
    }
}

/// Modes a button can actually run in: knob is never valid for a button and
/// radio group only exists on the group members.
fn button_mode_for(index: usize, mode: ControllerMode) -> ControllerMode {
    match mode {
        ControllerMode::Knob => ControllerMode::Toggle,
        ControllerMode::RadioGroup if !(RADIO_GROUP_FIRST..=RADIO_GROUP_LAST).contains(&index) => {
            ControllerMode::Toggle
        }
        mode => mode,
    }
}

/// Board controller state machine.
pub struct Controller<S, A, L, D> {
    store: CalibrationStore<S>,
    banks: [PotBank<A>; 2],
    leds: L,
    delay: D,

    ui_mode: UiMode,
    settings: GlobalSettings,
    button_mode: [ControllerMode; BUTTON_COUNT],
    button_value: [u8; BUTTON_COUNT],
    button_leds: u8,
    indicator_position: u8,

    debouncer: ButtonDebouncer<BUTTON_COUNT>,
    previous_buttons: u32,
    long_press: [LongPressTimer; LONG_PRESS_BUTTONS],
    ignore_release: [bool; LONG_PRESS_BUTTONS],

    outbox: Deque<ControlEvent, OUTBOX_CAPACITY>,
}

impl<S, A, L, D> Controller<S, A, L, D>
where
    S: Storage,
    A: AnalogSource,
    L: LedDriver,
    D: DelayNs,
{
    /// Assemble a controller with factory settings. Call [`init`](Self::init)
    /// to load the persisted configuration.
    pub fn new(store: CalibrationStore<S>, banks: [PotBank<A>; 2], leds: L, delay: D) -> Self {
        let mut button_mode = [ControllerMode::Toggle; BUTTON_COUNT];
        for (index, mode) in button_mode.iter_mut().enumerate() {
            *mode = ControllerConfig::factory_default(index as u8).mode;
        }
        Self {
            store,
            banks,
            leds,
            delay,
            ui_mode: UiMode::Perform,
            settings: GlobalSettings::DEFAULT,
            button_mode,
            button_value: [0; BUTTON_COUNT],
            button_leds: 0,
            indicator_position: 0,
            debouncer: ButtonDebouncer::new(),
            previous_buttons: 0,
            long_press: [LongPressTimer::new(); LONG_PRESS_BUTTONS],
            ignore_release: [false; LONG_PRESS_BUTTONS],
            outbox: Deque::new(),
        }
    }

    /// Load button records, global settings and knob calibration, then
    /// show the loaded state on the LEDs.
    pub fn init(&mut self) {
        for index in 0..BUTTON_COUNT {
            match self.store.read_controller_config(index as u8) {
                Ok(config) => {
                    self.button_mode[index] = button_mode_for(index, config.mode);
                    self.button_value[index] = config.value;
                }
                Err(e) => warn!("button {} config unreadable: {}", index, e),
            }
        }
        self.settings = self.store.load_settings();
        for bank in &mut self.banks {
            bank.load_calibration(&mut self.store);
        }
        info!(
            "controller ready: steps={} status={:#x}",
            self.settings.increment_steps,
            self.settings.controller_status.raw()
        );

        self.refresh_button_leds();
        self.show_increment_value();
        self.refresh_indicators();
    }

    // --- Sampling ---

    /// Feed a raw sample of the button shift register (bit `i` = button `i`
    /// pressed). Contact bounce is filtered before any edge is handled.
    pub fn sample_buttons(&mut self, raw: u32, now_ms: u64) {
        let stable = self.debouncer.update(raw, now_ms);
        self.process_buttons(stable, now_ms);
    }

    /// Handle a debounced button mask. Only changed bits are acted on.
    pub fn process_buttons(&mut self, raw: u32, now_ms: u64) {
        for index in 0..BUTTON_COUNT {
            let pressed = (raw >> index) & 1 == 1;
            let was_pressed = (self.previous_buttons >> index) & 1 == 1;
            if pressed == was_pressed {
                continue;
            }

            if pressed {
                self.execute_press(index);
                if let Some(timer) = self.long_press.get_mut(index) {
                    timer.arm(now_ms);
                }
            } else if index < LONG_PRESS_BUTTONS {
                self.long_press[index].cancel();
                if self.ignore_release[index] {
                    self.ignore_release[index] = false;
                } else {
                    self.execute_release(index);
                }
            } else {
                self.execute_release(index);
            }
        }
        self.previous_buttons = raw;
    }

    /// Fire any expired long-press timers.
    pub fn poll_long_press(&mut self, now_ms: u64) {
        for index in 0..LONG_PRESS_BUTTONS {
            if self.long_press[index].fire_if_expired(now_ms) {
                self.execute_long_press(index);
            }
        }
    }

    /// Sample every enabled knob once. Filters run in every UI mode so
    /// calibration sees live values; events are only produced in perform
    /// mode.
    pub fn poll_knobs(&mut self) {
        for channel in 0..BANK_CHANNELS {
            for bank in 0..self.banks.len() {
                let index = self.banks[bank].controller_index(channel);
                if !self.controller_enabled(usize::from(index)) {
                    continue;
                }
                if self.banks[bank].update(channel) && self.ui_mode == UiMode::Perform {
                    let value = self.banks[bank].value(channel);
                    self.push_event(ControlEvent::new(index, value));
                }
            }
        }
    }

    /// Take the oldest queued event.
    pub fn pop_event(&mut self) -> Option<ControlEvent> {
        self.outbox.pop_front()
    }

    // --- Remote commands ---

    /// Execute a remote command frame. Unknown codes are ignored and
    /// out-of-range payload bytes are clamped.
    pub fn execute_remote_command(&mut self, frame: &CommandFrame) {
        let Some(code) = frame.code() else {
            debug!("ignoring unknown command {:#x}", frame.code_byte());
            return;
        };
        info!("remote command {}", code);

        match code {
            CommandCode::CalibrationMin => self.calibrate(CalibrationPoint::Min),
            CommandCode::CalibrationCenter => self.calibrate(CalibrationPoint::Center),
            CommandCode::CalibrationMax => self.calibrate(CalibrationPoint::Max),
            CommandCode::ControllerMode => {
                let mut modes = [0u8; MODE_BYTES];
                for (i, mode) in modes.iter_mut().enumerate() {
                    *mode = frame.payload_byte(i);
                }
                self.set_button_config(&modes);

                self.settings.increment_display_zero = frame.payload_byte(MODE_BYTES) != 0;
                log_write(
                    self.store
                        .write_increment_display_zero(self.settings.increment_display_zero),
                );
                self.button_value[INCREMENT_BUTTON] = 0;

                self.settings.radio_group_display_zero = frame.payload_byte(MODE_BYTES + 1) != 0;
                log_write(
                    self.store
                        .write_radio_group_display_zero(self.settings.radio_group_display_zero),
                );

                self.refresh_button_leds();
                self.show_increment_value();
                self.refresh_indicators();
            }
            CommandCode::ControllerStatus => {
                let mut enabled = [false; CONTROLLER_COUNT];
                for (i, on) in enabled.iter_mut().enumerate() {
                    *on = frame.payload_byte(i) != 0;
                }
                self.set_all_controller_status(&enabled);
            }
            CommandCode::SetButtonValues => {
                let mut values = [0u8; BUTTON_COUNT];
                for (i, value) in values.iter_mut().enumerate() {
                    *value = frame.payload_byte(i);
                }
                self.set_button_values(&values);
            }
        }
    }

    /// Capture `point` on all eight knobs, persist it and show the matching
    /// feedback pattern.
    pub fn calibrate(&mut self, point: CalibrationPoint) {
        self.toggle_ui_mode(UiMode::Calibration);
        self.delay.delay_ms(MODE_SETTLE_MS);

        for channel in 0..BANK_CHANNELS {
            for bank in &mut self.banks {
                let index = bank.controller_index(channel);
                let Some(state) = bank.channel_mut(channel) else {
                    continue;
                };
                let value = state.capture(point);
                let result = match point {
                    CalibrationPoint::Min => self.store.write_controller_min(index, value),
                    CalibrationPoint::Center => self.store.write_controller_center(index, value),
                    CalibrationPoint::Max => self.store.write_controller_max(index, value),
                };
                log_write(result);
            }
        }

        leds::flash_calibration(&mut self.leds, &mut self.delay, point);
        self.toggle_ui_mode(UiMode::Calibration);
    }

    /// Apply per-button modes from a `CONTROLLER_MODE` payload.
    ///
    /// The increment button takes its byte as the step count instead of a
    /// mode. All button values are reset.
    pub fn set_button_config(&mut self, modes: &[u8; MODE_BYTES]) {
        self.toggle_ui_mode(UiMode::Config);
        self.delay.delay_ms(MODE_SETTLE_MS);

        for (index, &byte) in modes.iter().enumerate() {
            self.button_value[index] = 0;
            if index == INCREMENT_BUTTON {
                let steps = GlobalSettings::clamp_increment_steps(byte);
                self.button_mode[index] = ControllerMode::Increment;
                self.settings.increment_steps = steps;
                log_write(self.store.write_increment_steps(steps));
                log_write(
                    self.store
                        .write_controller_mode(index as u8, ControllerMode::Increment),
                );

                set_led(&mut self.button_leds, index, steps > 1);
                self.leds.set_button_leds(self.button_leds);
                self.indicator_position = steps - 1;
                self.refresh_indicators();
                self.delay.delay_ms(STEPS_DISPLAY_MS);
            } else {
                let mode = button_mode_for(index, ControllerMode::from_command(byte));
                self.button_mode[index] = mode;
                set_led(&mut self.button_leds, index, mode == ControllerMode::Toggle);
                self.leds.set_button_leds(self.button_leds);
                log_write(self.store.write_controller_mode(index as u8, mode));
            }
            trace!("button {} -> {}", index, self.button_mode[index]);
            self.delay.delay_ms(BUTTON_CONFIG_GAP_MS);
        }

        self.delay.delay_ms(CONFIG_EXIT_MS);
        self.toggle_ui_mode(UiMode::Config);
        self.delay.delay_ms(MODE_SETTLE_MS);
    }

    /// Replace the whole enable mask, persist it and acknowledge with a
    /// blink of button LED 0.
    pub fn set_all_controller_status(&mut self, enabled: &[bool; CONTROLLER_COUNT]) {
        let mut status = ControllerStatus::NONE;
        for (index, &on) in enabled.iter().enumerate() {
            status.set(index, on);
        }
        self.settings.controller_status = status;
        log_write(self.store.write_controller_status(status));
        debug!("controller status {:#x}", status.raw());

        leds::blink_status(&mut self.leds, &mut self.delay, self.button_leds);
        self.refresh_button_leds();
    }

    /// Bulk-set button values. Disabled and momentary buttons, and bytes
    /// equal to [`BUTTON_VALUE_UNCHANGED`], are skipped.
    pub fn set_button_values(&mut self, values: &[u8; BUTTON_COUNT]) {
        for (index, &value) in values.iter().enumerate() {
            let mode = self.button_mode[index];
            if !self.controller_enabled(index)
                || value == BUTTON_VALUE_UNCHANGED
                || mode == ControllerMode::Momentary
            {
                continue;
            }
            self.button_value[index] = match mode {
                ControllerMode::Increment => value.min(self.settings.increment_max()),
                ControllerMode::RadioGroup if index == RADIO_GROUP_FIRST => {
                    value.min(self.settings.radio_group_max())
                }
                ControllerMode::RadioGroup => 0,
                _ => u8::from(value != 0),
            };
        }

        self.refresh_button_leds();
        self.show_increment_value();
        self.refresh_indicators();
    }

    // --- UI mode ---

    #[inline]
    #[must_use]
    pub fn ui_mode(&self) -> UiMode {
        self.ui_mode
    }

    /// Enter `target` from perform mode, or return to perform mode from
    /// any other mode.
    pub fn toggle_ui_mode(&mut self, target: UiMode) {
        if self.ui_mode == UiMode::Perform {
            self.set_ui_mode(target);
        } else {
            self.set_ui_mode(UiMode::Perform);
        }
    }

    fn set_ui_mode(&mut self, mode: UiMode) {
        leds::flash_mode_change(&mut self.leds, &mut self.delay);
        self.ui_mode = mode;
        info!("ui mode {}", mode);

        match mode {
            UiMode::Config => {
                self.indicator_position = self.settings.increment_steps.saturating_sub(1);
                self.refresh_indicators();
                for index in 0..BUTTON_COUNT {
                    let on = index == INCREMENT_BUTTON
                        || self.button_mode[index] == ControllerMode::Toggle;
                    set_led(&mut self.button_leds, index, on);
                }
                self.leds.set_button_leds(self.button_leds);
            }
            UiMode::Calibration => {
                self.indicator_position = 0;
                self.refresh_indicators();
                self.button_leds = 0;
                set_led(&mut self.button_leds, 0, true);
                self.leds.set_button_leds(self.button_leds);
            }
            UiMode::Perform => {
                self.refresh_button_leds();
                self.show_increment_value();
                self.refresh_indicators();
            }
        }
    }

    // --- Buttons ---

    fn execute_press(&mut self, index: usize) {
        if self.ui_mode != UiMode::Perform || !self.controller_enabled(index) {
            return;
        }
        if self.button_mode[index] == ControllerMode::Momentary {
            self.button_value[index] = 1;
            self.push_button_event(index);
            self.refresh_button_leds();
        }
    }

    fn execute_release(&mut self, index: usize) {
        if self.ui_mode != UiMode::Perform || !self.controller_enabled(index) {
            return;
        }

        match self.button_mode[index] {
            ControllerMode::Toggle | ControllerMode::Knob => {
                self.button_value[index] = u8::from(self.button_value[index] == 0);
            }
            ControllerMode::Momentary => self.button_value[index] = 0,
            ControllerMode::Increment => {
                let wrap = self.settings.increment_max() + 1;
                self.button_value[index] = self.button_value[index].saturating_add(1) % wrap;
                self.show_increment_value();
                self.refresh_indicators();
            }
            ControllerMode::RadioGroup => {
                let offset = (index - RADIO_GROUP_FIRST) as u8;
                let value = if self.settings.radio_group_display_zero {
                    // Re-selecting the current member clears the selection
                    if self.button_value[RADIO_GROUP_FIRST] == offset + 1 {
                        0
                    } else {
                        offset + 1
                    }
                } else {
                    offset
                };
                self.button_value[RADIO_GROUP_FIRST] = value;
            }
        }

        self.push_button_event(index);
        self.refresh_button_leds();
    }

    fn execute_long_press(&mut self, index: usize) {
        // Mode switching is only reachable through remote commands: not all
        // boards have both buttons fitted.
        trace!("long press on button {} ignored", index);
    }

    /// Queue the event for a button that was just handled.
    fn push_button_event(&mut self, index: usize) {
        let max = u32::from(VALUE_MAX);
        let value = u32::from(self.button_value[index]);
        let (index, scaled) = match self.button_mode[index] {
            ControllerMode::Toggle | ControllerMode::Momentary | ControllerMode::Knob => {
                (index, value * max)
            }
            ControllerMode::Increment => {
                let steps = u32::from(self.settings.increment_max());
                (index, if steps == 0 { 0 } else { value * max / steps })
            }
            ControllerMode::RadioGroup => {
                let group = u32::from(self.button_value[RADIO_GROUP_FIRST]);
                let divisor = u32::from(self.settings.radio_group_max());
                (RADIO_GROUP_FIRST, group * max / divisor)
            }
        };
        let value = scaled.min(max) as u16;
        self.push_event(ControlEvent::new(index as u8, value));
    }

    fn push_event(&mut self, event: ControlEvent) {
        trace!("event {} = {}", event.index, event.value);
        if self.outbox.push_back(event).is_err() {
            warn!("outbox full, dropping event for controller {}", event.index);
        }
    }

    // --- LEDs ---

    /// Recompute the button LED mask from the button values and latch it.
    fn refresh_button_leds(&mut self) {
        let radio_group = self.button_mode[RADIO_GROUP_FIRST] == ControllerMode::RadioGroup;
        let group_value = self.button_value[RADIO_GROUP_FIRST];

        for index in 0..BUTTON_COUNT {
            let mut on = self.button_value[index] != 0;
            if index == INCREMENT_BUTTON && !self.settings.increment_display_zero {
                on = false;
            }
            if radio_group && (RADIO_GROUP_FIRST..=RADIO_GROUP_LAST).contains(&index) {
                let member = (index - RADIO_GROUP_FIRST) as u8;
                on = if self.settings.radio_group_display_zero {
                    group_value == member + 1
                } else {
                    group_value == member
                };
            }
            set_led(&mut self.button_leds, index, on);
        }
        self.leds.set_button_leds(self.button_leds);
    }

    /// Point the indicators at the increment button value.
    fn show_increment_value(&mut self) {
        let value = self.button_value[INCREMENT_BUTTON];
        self.indicator_position = if self.settings.increment_display_zero {
            value
        } else {
            value.saturating_add(1)
        };
    }

    /// Drive the indicators; polarity is inverted in config mode.
    fn refresh_indicators(&mut self) {
        let inverted = self.ui_mode == UiMode::Config;
        self.leds
            .set_indicator_leds(indicator_states(self.indicator_position, inverted));
    }

    // --- Accessors ---

    /// Whether controller `index` is enabled.
    #[inline]
    #[must_use]
    pub fn controller_enabled(&self, index: usize) -> bool {
        self.settings.controller_status.is_enabled(index)
    }

    #[must_use]
    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    #[must_use]
    pub fn button_mode(&self, index: usize) -> Option<ControllerMode> {
        self.button_mode.get(index).copied()
    }

    #[must_use]
    pub fn button_value(&self, index: usize) -> Option<u8> {
        self.button_value.get(index).copied()
    }

    /// Current button LED mask.
    #[must_use]
    pub fn button_leds(&self) -> u8 {
        self.button_leds
    }

    /// Current indicator position (1-based, 0 = dark).
    #[must_use]
    pub fn indicator_position(&self) -> u8 {
        self.indicator_position
    }

    #[must_use]
    pub fn bank(&self, bank: usize) -> Option<&PotBank<A>> {
        self.banks.get(bank)
    }

    pub fn bank_mut(&mut self, bank: usize) -> Option<&mut PotBank<A>> {
        self.banks.get_mut(bank)
    }

    pub fn store_mut(&mut self) -> &mut CalibrationStore<S> {
        &mut self.store
    }

    #[must_use]
    pub fn leds(&self) -> &L {
        &self.leds
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::filter::AdcError;
    use crate::leds::mock::{CountingDelay, RecordingLeds};
    use crate::storage::RamStorage;
    use rainpots_proto::{
        CONTROLLER_MODE_PAYLOAD_LEN, CONTROLLER_STATUS_PAYLOAD_LEN, SET_BUTTON_VALUES_PAYLOAD_LEN,
    };
    use std::vec::Vec;

    struct FixedAdc {
        samples: [i16; 4],
    }

    impl AnalogSource for FixedAdc {
        fn read_single_ended(&mut self, channel: u8) -> Result<i16, AdcError> {
            self.samples
                .get(usize::from(channel))
                .copied()
                .ok_or(AdcError::InvalidChannel)
        }
    }

    type TestController = Controller<RamStorage<4096>, FixedAdc, RecordingLeds, CountingDelay>;

    fn controller_with(storage: RamStorage<4096>) -> TestController {
        let store = CalibrationStore::open(storage, false).unwrap();
        let banks = [
            PotBank::new(FixedAdc { samples: [0; 4] }, 6),
            PotBank::new(FixedAdc { samples: [0; 4] }, 10),
        ];
        let mut controller =
            Controller::new(store, banks, RecordingLeds::default(), CountingDelay::default());
        controller.init();
        controller
    }

    fn controller() -> TestController {
        controller_with(RamStorage::new())
    }

    fn drain(controller: &mut TestController) -> Vec<ControlEvent> {
        core::iter::from_fn(|| controller.pop_event()).collect()
    }

    fn click(controller: &mut TestController, index: usize) -> Vec<ControlEvent> {
        controller.process_buttons(1 << index, 0);
        controller.process_buttons(0, 10);
        drain(controller)
    }

    fn command(code: CommandCode, payload: &[u8]) -> CommandFrame {
        let mut bytes = [0u8; 24];
        bytes[0] = code as u8;
        bytes[1..=payload.len()].copy_from_slice(payload);
        CommandFrame::from_bytes(&bytes[..=code.payload_len()])
    }

    fn mode_command(modes: [u8; 6], inc_zero: u8, radio_zero: u8) -> CommandFrame {
        let mut payload = [0u8; CONTROLLER_MODE_PAYLOAD_LEN];
        payload[..6].copy_from_slice(&modes);
        payload[6] = inc_zero;
        payload[7] = radio_zero;
        command(CommandCode::ControllerMode, &payload)
    }

    fn set_knob_samples(controller: &mut TestController, raw: i16) {
        for bank in 0..2 {
            controller.bank_mut(bank).unwrap().adc_mut().samples = [raw; 4];
        }
    }

    #[test]
    fn test_toggle_flips_on_release() {
        let mut c = controller();
        c.process_buttons(0b1, 0);
        assert!(drain(&mut c).is_empty());
        c.process_buttons(0, 10);
        assert_eq!(drain(&mut c), [ControlEvent::new(0, 511)]);
        assert_eq!(c.button_leds() & 1, 1);

        assert_eq!(click(&mut c, 0), [ControlEvent::new(0, 0)]);
        assert_eq!(c.button_leds() & 1, 0);
    }

    #[test]
    fn test_momentary_press_and_release() {
        let mut c = controller();
        c.execute_remote_command(&mode_command([0, 5, 1, 0, 0, 0], 1, 0));
        assert_eq!(c.button_mode(2), Some(ControllerMode::Momentary));

        c.process_buttons(0b100, 0);
        assert_eq!(drain(&mut c), [ControlEvent::new(2, 511)]);
        c.process_buttons(0, 50);
        assert_eq!(drain(&mut c), [ControlEvent::new(2, 0)]);
    }

    #[test]
    fn test_increment_wraps() {
        let mut c = controller();
        assert_eq!(c.settings().increment_steps, 5);
        let values: Vec<u8> = (0..6)
            .map(|_| {
                click(&mut c, 1);
                c.button_value(1).unwrap()
            })
            .collect();
        assert_eq!(values, [1, 2, 3, 4, 0, 1]);
    }

    #[test]
    fn test_increment_event_scaling_and_indicators() {
        let mut c = controller();
        assert_eq!(click(&mut c, 1), [ControlEvent::new(1, 127)]);
        assert_eq!(c.indicator_position(), 1);
        assert_eq!(
            c.leds().last_indicators(),
            Some([true, false, false, false])
        );
        click(&mut c, 1);
        click(&mut c, 1);
        assert_eq!(click(&mut c, 1), [ControlEvent::new(1, 511)]);
    }

    #[test]
    fn test_increment_without_zero_caps_at_three() {
        let mut c = controller();
        c.execute_remote_command(&mode_command([0, 5, 0, 0, 0, 0], 0, 0));
        assert_eq!(c.settings().increment_max(), 3);
        // indicator shows value + 1 when zero is hidden
        assert_eq!(c.indicator_position(), 1);
        let values: Vec<u8> = (0..4)
            .map(|_| {
                click(&mut c, 1);
                c.button_value(1).unwrap()
            })
            .collect();
        assert_eq!(values, [1, 2, 3, 0]);
        assert_eq!(c.button_leds() & 0b10, 0);
    }

    #[test]
    fn test_radio_group_selection() {
        let mut c = controller();
        c.execute_remote_command(&mode_command([0, 5, 4, 4, 4, 4], 1, 0));
        assert_eq!(click(&mut c, 4), [ControlEvent::new(2, 340)]);
        assert_eq!(c.button_value(2), Some(2));
        assert_eq!(c.button_leds() & 0b11_1100, 0b01_0000);

        assert_eq!(click(&mut c, 2), [ControlEvent::new(2, 0)]);
        assert_eq!(c.button_leds() & 0b11_1100, 0b00_0100);
    }

    #[test]
    fn test_radio_group_reselect_clears_with_zero() {
        let mut c = controller();
        c.execute_remote_command(&mode_command([0, 5, 4, 4, 4, 4], 1, 1));
        assert_eq!(click(&mut c, 4), [ControlEvent::new(2, 383)]);
        assert_eq!(c.button_value(2), Some(3));
        assert_eq!(click(&mut c, 4), [ControlEvent::new(2, 0)]);
        assert_eq!(c.button_value(2), Some(0));
        assert_eq!(c.button_leds() & 0b11_1100, 0);
        assert_eq!(click(&mut c, 5), [ControlEvent::new(2, 511)]);
    }

    #[test]
    fn test_radio_mode_outside_group_is_toggle() {
        let mut c = controller();
        c.execute_remote_command(&mode_command([4, 5, 0, 0, 0, 0], 1, 0));
        assert_eq!(c.button_mode(0), Some(ControllerMode::Toggle));
    }

    #[test]
    fn test_controller_mode_persists() {
        let mut c = controller();
        c.execute_remote_command(&mode_command([1, 9, 4, 7, 0, 4], 0, 1));
        assert_eq!(c.ui_mode(), UiMode::Perform);
        assert_eq!(c.settings().increment_steps, 5);
        assert!(!c.settings().increment_display_zero);
        assert!(c.settings().radio_group_display_zero);
        assert_eq!(c.button_mode(3), Some(ControllerMode::Toggle));

        let store = c.store_mut();
        assert_eq!(store.read_controller_mode(0).unwrap(), 1);
        assert_eq!(store.read_controller_mode(1).unwrap(), 2);
        assert_eq!(store.read_controller_mode(2).unwrap(), 4);
        assert_eq!(store.read_controller_mode(3).unwrap(), 0);
        assert!(!store.read_increment_display_zero().unwrap());
        assert!(store.read_radio_group_display_zero().unwrap());
    }

    #[test]
    fn test_controller_mode_resets_values() {
        let mut c = controller();
        click(&mut c, 0);
        click(&mut c, 1);
        c.execute_remote_command(&mode_command([0, 3, 0, 0, 0, 0], 1, 0));
        assert_eq!(c.button_value(0), Some(0));
        assert_eq!(c.button_value(1), Some(0));
        assert_eq!(c.settings().increment_max(), 2);
    }

    #[test]
    fn test_persisted_config_loaded_on_init() {
        let mut first = controller();
        first.execute_remote_command(&mode_command([1, 3, 0, 0, 0, 0], 1, 0));
        let storage = first.store.into_inner();

        let second = controller_with(storage);
        assert_eq!(second.button_mode(0), Some(ControllerMode::Momentary));
        assert_eq!(second.settings().increment_steps, 3);
    }

    #[test]
    fn test_controller_status_gates_buttons() {
        let mut c = controller();
        let mut payload = [1u8; CONTROLLER_STATUS_PAYLOAD_LEN];
        payload[0] = 0;
        c.execute_remote_command(&command(CommandCode::ControllerStatus, &payload));

        assert!(!c.controller_enabled(0));
        assert!(c.controller_enabled(13));
        assert!(click(&mut c, 0).is_empty());
        assert_eq!(click(&mut c, 3).len(), 1);
        assert_eq!(
            c.store_mut().read_controller_status().unwrap(),
            ControllerStatus(0x3FFE)
        );
    }

    #[test]
    fn test_set_button_values() {
        let mut c = controller();
        c.execute_remote_command(&mode_command([0, 5, 1, 0, 0, 0], 1, 0));
        let values: [u8; 6] = [1, 9, 1, 0x0F, 7, 0];
        c.execute_remote_command(&command(CommandCode::SetButtonValues, &values));
        assert_eq!(c.button_value(0), Some(1));
        assert_eq!(c.button_value(1), Some(4));
        // momentary untouched
        assert_eq!(c.button_value(2), Some(0));
        assert_eq!(c.button_value(4), Some(1));
        assert_eq!(c.indicator_position(), 4);
        assert!(drain(&mut c).is_empty());
    }

    #[test]
    fn test_set_button_values_unchanged_sentinel() {
        let mut c = controller();
        click(&mut c, 3);
        assert_eq!(c.button_value(3), Some(1));
        let mut values = [0u8; SET_BUTTON_VALUES_PAYLOAD_LEN];
        values[3] = BUTTON_VALUE_UNCHANGED;
        c.execute_remote_command(&command(CommandCode::SetButtonValues, &values));
        assert_eq!(c.button_value(3), Some(1));
        assert_eq!(c.button_value(0), Some(0));
    }

    #[test]
    fn test_set_button_values_radio_group_clamp() {
        let mut c = controller();
        c.execute_remote_command(&mode_command([0, 5, 4, 4, 4, 4], 1, 0));
        c.execute_remote_command(&command(CommandCode::SetButtonValues, &[0, 0, 9, 2, 2, 2]));
        assert_eq!(c.button_value(2), Some(3));
        assert_eq!(c.button_value(3), Some(0));
    }

    #[test]
    fn test_unknown_command_is_noop() {
        let mut c = controller();
        let before = c.leds().writes.len();
        c.execute_remote_command(&CommandFrame::from_bytes(&[0x42]));
        assert_eq!(c.leds().writes.len(), before);
        assert_eq!(c.ui_mode(), UiMode::Perform);
    }

    #[test]
    fn test_ui_mode_toggle_blocks_buttons() {
        let mut c = controller();
        c.toggle_ui_mode(UiMode::Config);
        assert_eq!(c.ui_mode(), UiMode::Config);
        assert!(click(&mut c, 0).is_empty());
        // config mode inverts the indicators: steps - 1 = 4 is the dark one
        assert_eq!(c.leds().last_indicators(), Some([true, true, true, false]));

        c.toggle_ui_mode(UiMode::Calibration);
        assert_eq!(c.ui_mode(), UiMode::Perform);
        assert_eq!(click(&mut c, 0).len(), 1);
    }

    #[test]
    fn test_knob_events_only_in_perform_mode() {
        let mut c = controller();
        set_knob_samples(&mut c, 990);
        for _ in 0..50 {
            c.poll_knobs();
        }
        let events = drain(&mut c);
        assert!(events.iter().any(|e| e.index == 6));
        assert!(events.iter().any(|e| e.index == 13));
        assert!(events.iter().all(|e| (6..=13).contains(&e.index)));

        c.toggle_ui_mode(UiMode::Config);
        set_knob_samples(&mut c, 0);
        for _ in 0..50 {
            c.poll_knobs();
        }
        assert!(drain(&mut c).is_empty());
    }

    #[test]
    fn test_disabled_knob_is_frozen() {
        let mut c = controller();
        let mut payload = [1u8; CONTROLLER_STATUS_PAYLOAD_LEN];
        payload[7] = 0;
        c.execute_remote_command(&command(CommandCode::ControllerStatus, &payload));
        set_knob_samples(&mut c, 990);
        for _ in 0..50 {
            c.poll_knobs();
        }
        let events = drain(&mut c);
        assert!(events.iter().all(|e| e.index != 7));
        assert_eq!(c.bank(0).unwrap().value(1), 0);
    }

    #[test]
    fn test_calibration_min_persists() {
        let mut c = controller();
        set_knob_samples(&mut c, 20);
        c.poll_knobs();
        drain(&mut c);
        c.execute_remote_command(&command(CommandCode::CalibrationMin, &[]));

        assert_eq!(c.ui_mode(), UiMode::Perform);
        for index in 6..14 {
            assert_eq!(c.store_mut().read_controller_min(index).unwrap(), 23);
        }
        assert_eq!(c.bank(1).unwrap().channel(3).unwrap().min(), 23);
    }

    #[test]
    fn test_calibration_center_rejects_low_output() {
        let mut c = controller();
        c.store_mut().write_controller_center(6, 300).unwrap();
        c.execute_remote_command(&command(CommandCode::CalibrationCenter, &[]));
        assert_eq!(c.store_mut().read_controller_center(6).unwrap(), 0);
    }

    #[test]
    fn test_bouncy_click_toggles_once() {
        let mut c = controller();
        let mut samples = Vec::new();
        samples.extend_from_slice(&[1, 0, 1, 0]);
        samples.extend(core::iter::repeat(1).take(10));
        samples.extend_from_slice(&[0, 1, 0, 1]);
        samples.extend(core::iter::repeat(0).take(10));

        for (t, raw) in samples.into_iter().enumerate() {
            c.sample_buttons(raw, t as u64);
        }
        assert_eq!(drain(&mut c), [ControlEvent::new(0, 511)]);
        assert_eq!(c.button_leds() & 1, 1);
    }

    #[test]
    fn test_short_glitch_is_ignored() {
        let mut c = controller();
        c.sample_buttons(0b1, 0);
        c.sample_buttons(0, 2);
        for t in 3..20 {
            c.sample_buttons(0, t);
        }
        assert!(drain(&mut c).is_empty());
        assert_eq!(c.button_leds() & 1, 0);
    }

    #[test]
    fn test_calibration_max_persists() {
        let mut c = controller();
        set_knob_samples(&mut c, 1000);
        c.poll_knobs();
        drain(&mut c);
        c.execute_remote_command(&command(CommandCode::CalibrationMax, &[]));

        assert_eq!(c.ui_mode(), UiMode::Perform);
        for index in 6..14 {
            assert_eq!(c.store_mut().read_controller_max(index).unwrap(), 993);
        }
        assert_eq!(c.bank(0).unwrap().channel(2).unwrap().max(), 993);
    }

    #[test]
    fn test_calibration_max_is_clipped() {
        let mut c = controller();
        set_knob_samples(&mut c, 2000);
        c.poll_knobs();
        c.execute_remote_command(&command(CommandCode::CalibrationMax, &[]));
        assert_eq!(c.store_mut().read_controller_max(9).unwrap(), 1500);
    }

    #[test]
    fn test_calibration_center_captures_output() {
        let mut c = controller();
        set_knob_samples(&mut c, 990);
        for _ in 0..500 {
            c.poll_knobs();
            drain(&mut c);
        }
        let output = u32::from(c.bank(0).unwrap().channel(0).unwrap().output());
        assert!(output > 150);

        c.execute_remote_command(&command(CommandCode::CalibrationCenter, &[]));
        for index in 6..14 {
            assert_eq!(c.store_mut().read_controller_center(index).unwrap(), output);
        }
        assert_eq!(c.bank(1).unwrap().channel(1).unwrap().center(), output);
    }

    #[test]
    fn test_long_press_is_noop() {
        let mut c = controller();
        c.process_buttons(0b1, 0);
        c.poll_long_press(1500);
        assert!(drain(&mut c).is_empty());
        c.process_buttons(0, 1600);
        assert_eq!(drain(&mut c), [ControlEvent::new(0, 511)]);
    }
}
