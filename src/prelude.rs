// Copyright 2026 The samd21-retick authors.
//
// SPDX-License-Identifier: MIT OR Apache-2.0

pub use crate::adc::AdcRegisters as _samd21_retick_adc_AdcRegisters;
pub use crate::temperature::FactoryCalibration as _samd21_retick_temperature_FactoryCalibration;
pub use crate::tick::Idle as _samd21_retick_tick_Idle;
pub use crate::tick::InterruptLine as _samd21_retick_tick_InterruptLine;
pub use crate::tick::TimerRegisters as _samd21_retick_tick_TimerRegisters;
pub use crate::time::U32Ext as _samd21_retick_time_U32Ext;
#[cfg(feature = "embedded-hal-02")]
pub use embedded_hal_02::adc::OneShot as _embedded_hal_adc_OneShot;
