// Copyright 2026 The samd21-retick authors.
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time units

/// Hertz
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hertz(pub u32);

impl Hertz {
    /// Number of clock cycles in one millisecond at this frequency.
    pub const fn cycles_per_millisecond(self) -> u32 {
        self.0 / 1_000
    }
}

/// Extension trait that adds convenience methods to the `u32` type
pub trait U32Ext {
    /// Wrap in `Hertz`
    fn hz(self) -> Hertz;

    /// Wrap in `Hertz`, scaled by 1 000. Saturates at `u32::MAX` Hz.
    fn khz(self) -> Hertz;

    /// Wrap in `Hertz`, scaled by 1 000 000. Saturates at `u32::MAX` Hz.
    fn mhz(self) -> Hertz;
}

impl U32Ext for u32 {
    fn hz(self) -> Hertz {
        Hertz(self)
    }

    fn khz(self) -> Hertz {
        Hertz(self.saturating_mul(1_000))
    }

    fn mhz(self) -> Hertz {
        Hertz(self.saturating_mul(1_000_000))
    }
}
