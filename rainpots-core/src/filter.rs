//! Potentiometer conditioning.
//!
//! Each knob channel runs the same pipeline on every poll:
//!
//! 1. map the raw ADC sample from the calibrated `[min, max]` to `0..=511`
//! 2. normalize to `[0, 1]`
//! 3. three cascaded exponential smoothers (0.93, 0.90, 0.88)
//! 4. re-linearize the second stage with `x^9`
//! 5. scale back to `0..=511`
//! 6. limit the step from the previous output to ±10
//! 7. lock after 25 equal samples, unlock on a change greater than 3
//! 8. remap around the calibrated center with a ±10 dead band
//!
//! Only the result of step 8 is visible outside this module.

use crate::storage::{CalibrationStore, Storage};
use crate::types::{ControllerConfig, BANK_CHANNELS};

/// Largest value a channel reports.
pub const OUTPUT_MAX: i32 = 511;

/// Equal samples needed before a channel locks.
pub const LOCK_THRESHOLD: u8 = 25;

/// Smallest change (exclusive) that unlocks a locked channel.
pub const UNLOCK_THRESHOLD: i32 = 3;

/// Largest change accepted per sample. Must exceed [`UNLOCK_THRESHOLD`].
pub const MAX_STEP: i32 = 10;

/// Half width of the dead band around a calibrated center.
pub const CENTER_MARGIN: i32 = 10;

/// Output reported anywhere inside the center dead band.
pub const CENTER_OUTPUT: i32 = 255;

/// Upper bound for captured raw calibration limits.
pub const CALIBRATION_LIMIT: f64 = 1500.0;

/// Margin added to the raw sample when capturing the minimum.
pub const MIN_MARGIN: f64 = 3.0;

/// Margin subtracted from the raw sample when capturing the maximum.
pub const MAX_MARGIN: f64 = 7.0;

/// Output a captured center must exceed, otherwise the center is cleared.
pub const CENTER_CAPTURE_FLOOR: i32 = 150;

const SMOOTHING: [f64; 3] = [0.93, 0.90, 0.88];
const RELINEARIZE_EXPONENT: f64 = 9.0;

/// Error type for ADC reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    /// Bus transaction failed.
    Bus,
    /// Channel number not supported by the converter.
    InvalidChannel,
}

/// A multi-channel ADC read one single-ended channel at a time.
pub trait AnalogSource {
    /// Blocking conversion of `channel`.
    fn read_single_ended(&mut self, channel: u8) -> Result<i16, AdcError>;
}

impl<T: AnalogSource + ?Sized> AnalogSource for &mut T {
    fn read_single_ended(&mut self, channel: u8) -> Result<i16, AdcError> {
        (**self).read_single_ended(channel)
    }
}

/// Calibration point captured from the live knob position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationPoint {
    Min,
    Center,
    Max,
}

fn clip(x: f64, min: f64, max: f64) -> f64 {
    libm::round(x).clamp(min, max)
}

/// Linear map with clipping to the output range. A degenerate input range
/// maps to `out_min`.
fn map(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> i32 {
    if in_max == in_min {
        return out_min as i32;
    }
    let mapped = (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min;
    clip(mapped, out_min, out_max) as i32
}

#[inline]
fn smooth(new: f64, old: f64, weight: f64) -> f64 {
    (1.0 - weight) * new + weight * old
}

/// Remap `value` around `center` with a dead band.
///
/// A `center` of 0 means uncalibrated and returns `value` unchanged.
#[must_use]
pub fn remap_centered(value: u16, center: u32) -> u16 {
    if center == 0 {
        return value;
    }
    let value = i32::from(value);
    let center = center.min(u32::from(u16::MAX)) as i32;
    let upper = center + CENTER_MARGIN;
    let lower = center - CENTER_MARGIN;

    let remapped = if value > upper {
        map(
            f64::from(value),
            f64::from(upper),
            f64::from(OUTPUT_MAX),
            f64::from(CENTER_OUTPUT),
            f64::from(OUTPUT_MAX),
        )
    } else if value < lower {
        map(
            f64::from(value),
            0.0,
            f64::from(lower),
            0.0,
            f64::from(CENTER_OUTPUT),
        )
    } else {
        CENTER_OUTPUT
    };
    remapped as u16
}

/// Filter state of one knob.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogChannel {
    min: f64,
    max: f64,
    center: u32,
    smoothed: [f64; 3],
    raw: f64,
    output: i32,
    centered: u16,
    locked: bool,
    same_count: u8,
}

impl AnalogChannel {
    /// Channel with factory calibration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            min: f64::from(ControllerConfig::DEFAULT_KNOB_MIN),
            max: f64::from(ControllerConfig::DEFAULT_KNOB_MAX),
            center: 0,
            smoothed: [0.0; 3],
            raw: 0.0,
            output: 0,
            centered: 0,
            locked: false,
            same_count: 0,
        }
    }

    /// Replace the calibration.
    pub fn set_calibration(&mut self, min: u32, max: u32, center: u32) {
        self.min = f64::from(min);
        self.max = f64::from(max);
        self.center = center;
    }

    /// Feed a raw sample. Returns whether the reported value changed.
    pub fn process(&mut self, raw: i16) -> bool {
        self.raw = f64::from(raw);
        let candidate = self.condition(self.raw);
        self.settle(candidate);

        let previous = self.centered;
        self.centered = remap_centered(self.output as u16, self.center);
        previous != self.centered
    }

    /// Steps 1-5: calibrated map, smoothing and re-linearization.
    fn condition(&mut self, raw: f64) -> i32 {
        let mapped = map(raw, self.min, self.max, 0.0, f64::from(OUTPUT_MAX));
        let mut stage = f64::from(mapped) / f64::from(OUTPUT_MAX);
        for (old, weight) in self.smoothed.iter_mut().zip(SMOOTHING) {
            stage = smooth(stage, *old, weight);
            *old = stage;
        }
        let linearized = libm::pow(self.smoothed[1], RELINEARIZE_EXPONENT);
        libm::round(linearized * f64::from(OUTPUT_MAX)) as i32
    }

    /// Steps 6-7: step limit and lock hysteresis.
    fn settle(&mut self, candidate: i32) {
        let candidate = candidate.clamp(self.output - MAX_STEP, self.output + MAX_STEP);

        if self.locked {
            if (candidate - self.output).abs() > UNLOCK_THRESHOLD {
                self.output = candidate;
                self.locked = false;
                self.same_count = 0;
            }
            return;
        }

        if candidate == self.output {
            self.same_count = self.same_count.saturating_add(1);
            if self.same_count >= LOCK_THRESHOLD {
                self.locked = true;
            }
        } else {
            self.same_count = 0;
            self.output = candidate;
        }
    }

    /// Capture a calibration point from the current position and return
    /// the new stored value.
    pub fn capture(&mut self, point: CalibrationPoint) -> u32 {
        match point {
            CalibrationPoint::Min => {
                self.min = clip(self.raw + MIN_MARGIN, 0.0, CALIBRATION_LIMIT);
                self.min as u32
            }
            CalibrationPoint::Max => {
                self.max = clip(self.raw - MAX_MARGIN, 0.0, CALIBRATION_LIMIT);
                self.max as u32
            }
            CalibrationPoint::Center => {
                self.center = if self.output > CENTER_CAPTURE_FLOOR {
                    self.output as u32
                } else {
                    0
                };
                self.center
            }
        }
    }

    /// Reported (centered) value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> u16 {
        self.centered
    }

    /// Step-limited output before center remapping.
    #[inline]
    #[must_use]
    pub fn output(&self) -> u16 {
        self.output as u16
    }

    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub fn min(&self) -> u32 {
        self.min as u32
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        self.max as u32
    }

    #[must_use]
    pub fn center(&self) -> u32 {
        self.center
    }
}

impl Default for AnalogChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Four knob channels behind one ADC.
pub struct PotBank<A> {
    adc: A,
    start_index: u8,
    channels: [AnalogChannel; BANK_CHANNELS],
}

impl<A: AnalogSource> PotBank<A> {
    /// Bank whose channel 0 is controller `start_index`.
    pub fn new(adc: A, start_index: u8) -> Self {
        Self {
            adc,
            start_index,
            channels: core::array::from_fn(|_| AnalogChannel::new()),
        }
    }

    /// Load min, max and center for every channel. Channels whose record
    /// cannot be read keep their current calibration.
    pub fn load_calibration<S: Storage>(&mut self, store: &mut CalibrationStore<S>) {
        for (channel, state) in self.channels.iter_mut().enumerate() {
            let index = self.start_index + channel as u8;
            let record = store.read_controller_min(index).and_then(|min| {
                let max = store.read_controller_max(index)?;
                let center = store.read_controller_center(index)?;
                Ok((min, max, center))
            });
            match record {
                Ok((min, max, center)) => {
                    debug!("knob {}: min={} max={} center={}", index, min, max, center);
                    state.set_calibration(min, max, center);
                }
                Err(e) => warn!("knob {} calibration unreadable: {}", index, e),
            }
        }
    }

    /// Sample `channel` and run it through its filter.
    ///
    /// Returns whether the reported value changed. A failed conversion
    /// counts as unchanged.
    pub fn update(&mut self, channel: usize) -> bool {
        let Some(state) = self.channels.get_mut(channel) else {
            return false;
        };
        match self.adc.read_single_ended(channel as u8) {
            Ok(raw) => state.process(raw),
            Err(e) => {
                debug!("adc read failed on channel {}: {}", channel, e);
                false
            }
        }
    }

    /// Reported value of `channel`.
    #[must_use]
    pub fn value(&self, channel: usize) -> u16 {
        self.channels.get(channel).map_or(0, AnalogChannel::value)
    }

    /// Controller index of `channel`.
    #[inline]
    #[must_use]
    pub fn controller_index(&self, channel: usize) -> u8 {
        self.start_index + channel as u8
    }

    #[must_use]
    pub fn channel(&self, channel: usize) -> Option<&AnalogChannel> {
        self.channels.get(channel)
    }

    pub fn channel_mut(&mut self, channel: usize) -> Option<&mut AnalogChannel> {
        self.channels.get_mut(channel)
    }

    /// Borrow the ADC.
    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }
}
