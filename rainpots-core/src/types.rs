//! Controller data model: modes, configuration records and the enable mask.

/// Number of physical buttons (controller indices 0-5).
pub const BUTTON_COUNT: usize = 6;

/// Number of knob channels across both ADC banks (controller indices 6-13).
pub const KNOB_COUNT: usize = 8;

/// Total number of logical controllers.
pub const CONTROLLER_COUNT: usize = BUTTON_COUNT + KNOB_COUNT;

/// Channels per ADC bank.
pub const BANK_CHANNELS: usize = 4;

/// First controller index of each ADC bank.
pub const BANK_START_INDEX: [u8; 2] = [6, 10];

/// The button whose mode is pinned to [`ControllerMode::Increment`].
pub const INCREMENT_BUTTON: usize = 1;

/// First member of the radio group; the group value is stored and reported here.
pub const RADIO_GROUP_FIRST: usize = 2;

/// Last member of the radio group.
pub const RADIO_GROUP_LAST: usize = 5;

/// Largest accepted increment step count (the indicator bank shows four positions).
pub const MAX_INCREMENT_STEPS: u8 = 5;

/// How a controller turns input into values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ControllerMode {
    #[default]
    Toggle = 0,
    Momentary = 1,
    Increment = 2,
    Knob = 3,
    RadioGroup = 4,
}

impl ControllerMode {
    /// Decode a mode byte as persisted in storage.
    #[must_use]
    pub const fn from_stored(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Toggle),
            1 => Some(Self::Momentary),
            2 => Some(Self::Increment),
            3 => Some(Self::Knob),
            4 => Some(Self::RadioGroup),
            _ => None,
        }
    }

    /// Decode a mode byte from a `CONTROLLER_MODE` command.
    ///
    /// Only toggle, momentary and radio-group can be selected remotely;
    /// anything else falls back to toggle.
    #[must_use]
    pub const fn from_command(byte: u8) -> Self {
        match byte {
            0x01 => Self::Momentary,
            0x04 => Self::RadioGroup,
            _ => Self::Toggle,
        }
    }

    /// Modes a physical button can take. Knob is reserved for ADC channels.
    #[inline]
    #[must_use]
    pub const fn is_button_mode(self) -> bool {
        !matches!(self, Self::Knob)
    }
}

/// Board-wide UI mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UiMode {
    #[default]
    Perform,
    Config,
    Calibration,
}

/// Persisted per-controller record.
///
/// Buttons use `mode` and `value`; knobs use `min`, `max` and `center`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerConfig {
    pub index: u8,
    pub mode: ControllerMode,
    pub value: u8,
    pub min: u32,
    pub max: u32,
    /// Calibrated center; 0 means unset.
    pub center: u32,
}

impl ControllerConfig {
    /// Factory default raw ADC lower bound for knobs.
    pub const DEFAULT_KNOB_MIN: u32 = 5;
    /// Factory default raw ADC upper bound for knobs.
    pub const DEFAULT_KNOB_MAX: u32 = 990;

    /// Factory default for the given controller index.
    #[must_use]
    pub const fn factory_default(index: u8) -> Self {
        if (index as usize) < BUTTON_COUNT {
            let mode = if index as usize == INCREMENT_BUTTON {
                ControllerMode::Increment
            } else {
                ControllerMode::Toggle
            };
            Self {
                index,
                mode,
                value: 0,
                min: 0,
                max: 0,
                center: 0,
            }
        } else {
            Self {
                index,
                mode: ControllerMode::Knob,
                value: 0,
                min: Self::DEFAULT_KNOB_MIN,
                max: Self::DEFAULT_KNOB_MAX,
                center: 0,
            }
        }
    }
}

/// Enable mask with one bit per controller index.
///
/// A cleared bit freezes that controller: it is neither read nor updated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerStatus(pub u32);

impl ControllerStatus {
    /// Factory default: every controller enabled.
    pub const ALL: Self = Self(0xFFFF);

    /// Every controller disabled.
    pub const NONE: Self = Self(0);

    /// Check whether controller `index` is enabled.
    #[inline]
    #[must_use]
    pub const fn is_enabled(self, index: usize) -> bool {
        index < 32 && (self.0 >> index) & 1 == 1
    }

    /// Enable or disable controller `index`. Indices past 31 are ignored.
    #[inline]
    pub fn set(&mut self, index: usize, enabled: bool) {
        if index >= 32 {
            return;
        }
        if enabled {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    /// Raw mask as persisted.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self::ALL
    }
}

/// Persisted board-wide settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlobalSettings {
    /// Number of positions of the increment button (1-5).
    pub increment_steps: u8,
    pub controller_status: ControllerStatus,
    /// Whether the increment button has a visible "zero" position.
    pub increment_display_zero: bool,
    /// Whether the radio group has a "none selected" position.
    pub radio_group_display_zero: bool,
}

impl GlobalSettings {
    /// Factory defaults.
    pub const DEFAULT: Self = Self {
        increment_steps: 5,
        controller_status: ControllerStatus::ALL,
        increment_display_zero: true,
        radio_group_display_zero: false,
    };

    /// Clamp an increment step count into the supported range.
    #[inline]
    #[must_use]
    pub fn clamp_increment_steps(steps: u8) -> u8 {
        steps.clamp(1, MAX_INCREMENT_STEPS)
    }

    /// Highest value the increment button reaches before wrapping to zero.
    ///
    /// Without a zero position the indicator bank limits the range to 0-3.
    #[must_use]
    pub fn increment_max(&self) -> u8 {
        let max = self.increment_steps.saturating_sub(1);
        if !self.increment_display_zero && max > 3 {
            3
        } else {
            max
        }
    }

    /// Highest value the radio group can report.
    #[inline]
    #[must_use]
    pub const fn radio_group_max(&self) -> u8 {
        if self.radio_group_display_zero {
            4
        } else {
            3
        }
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A controller update queued for transmission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlEvent {
    /// Controller index (radio group members report as index 2).
    pub index: u8,
    /// Value in 0-511.
    pub value: u16,
}

impl ControlEvent {
    #[must_use]
    pub const fn new(index: u8, value: u16) -> Self {
        Self { index, value }
    }
}
