// Copyright 2026 The samd21-retick authors.
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # ADC, temperature sensor and tick scheduler for SAM D21 microcontrollers
//!
//! Three small drivers:
//!
//! - [`adc`]: blocking, oversampled single conversions with a fixed reference/gain pairing.
//! - [`temperature`]: the on-die temperature sensor, converted with the factory calibration.
//! - [`tick`]: a timer/counter interrupt that runs an application callback once per period while
//!   the core sleeps in between.
//!
//! The drivers are written against small register-access traits. The [`samd21`] module implements
//! them for the real memory map; tests and other chips can provide their own.
//!
//! ## Usage
//!
//! ```ignore
//! static TICK: TickFlag = TickFlag::new();
//!
//! #[interrupt]
//! fn TCC1() {
//!     let mut tcc1 = unsafe { samd21::Tcc1::steal() };
//!     let _ = tick::on_interrupt(&mut tcc1, &mut samd21::Tcc1Interrupt, &TICK, Timeout::Unbounded);
//! }
//!
//! #[entry]
//! fn main() -> ! {
//!     let p = samd21::Peripherals::take().unwrap();
//!     let mut sensor =
//!         TemperatureSensor::new(p.adc, p.temperature_log, temperature::Config::default()).unwrap();
//!
//!     let scheduler = TickScheduler::new(p.tcc1, p.tcc1_interrupt, &TICK, tick::Config::default());
//!     let error = scheduler.run(1_000, &mut samd21::Wfi, || {
//!         let _mdeg = sensor.read_millidegrees();
//!         None
//!     });
//!     panic!("tick scheduler stopped: {:?}", error);
//! }
//! ```
//!
//! ## Cargo features
//!
//! - `defmt` or `log`: log through the respective crate.
//! - `embedded-hal-02`: implement `embedded_hal::adc::OneShot` for [`adc::Adc`].

#![no_std]
#![deny(rustdoc::broken_intra_doc_links)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod adc;
pub mod prelude;
pub mod samd21;
pub mod sync;
pub mod temperature;
pub mod tick;
pub mod time;
