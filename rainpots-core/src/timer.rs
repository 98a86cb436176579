//! Button timing: debouncing and long-press detection.

/// Hold time before a press counts as a long press.
pub const LONG_PRESS_INTERVAL_MS: u64 = 1000;

/// Time a button level must stay unchanged before it is accepted.
pub const DEBOUNCE_MS: u64 = 5;

/// Stable-time debouncer over a sampled button bitmask (bit `i` = button `i`).
///
/// A bit only changes in the reported mask once its raw level has held for
/// [`DEBOUNCE_MS`]. Every raw change restarts that bit's hold time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonDebouncer<const N: usize> {
    level: u32,
    stable: u32,
    changed_at: [u64; N],
}

impl<const N: usize> ButtonDebouncer<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            level: 0,
            stable: 0,
            changed_at: [0; N],
        }
    }

    /// Feed a raw sample taken at `now_ms` and return the debounced mask.
    pub fn update(&mut self, raw: u32, now_ms: u64) -> u32 {
        for (index, changed_at) in self.changed_at.iter_mut().enumerate().take(32) {
            let bit = 1u32 << index;
            if (raw ^ self.level) & bit != 0 {
                self.level ^= bit;
                *changed_at = now_ms;
            } else if (self.level ^ self.stable) & bit != 0
                && now_ms.saturating_sub(*changed_at) >= DEBOUNCE_MS
            {
                self.stable ^= bit;
            }
        }
        self.stable
    }

    /// Last accepted mask.
    #[inline]
    #[must_use]
    pub fn stable(&self) -> u32 {
        self.stable
    }
}

impl<const N: usize> Default for ButtonDebouncer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A cancellable one-shot deadline, polled by the owner.
///
/// Time is supplied by the caller in milliseconds so the timer works with
/// any monotonic clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LongPressTimer {
    deadline: Option<u64>,
}

impl LongPressTimer {
    #[must_use]
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Start (or restart) the timer at `now_ms`.
    pub fn arm(&mut self, now_ms: u64) {
        self.deadline = Some(now_ms.saturating_add(LONG_PRESS_INTERVAL_MS));
    }

    /// Stop the timer without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns `true` exactly once when the deadline has passed, disarming
    /// the timer.
    pub fn fire_if_expired(&mut self, now_ms: u64) -> bool {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
