// Copyright 2026 The samd21-retick authors.
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # API for the Analog to Digital converter
//!
//! The driver performs single, blocking conversions. Every conversion accumulates 1024 raw 12-bit
//! samples into an effective 16-bit result, with the longest sample-and-hold time the peripheral
//! supports, so a conversion takes tens of milliseconds. Between conversions the ADC is left
//! disabled.
//!
//! Only one conversion may be in flight at a time. The driver takes `&mut self` everywhere and must
//! never be used from interrupt context.

use crate::sync::{Timeout, wait_while};

/// `CTRLB`: prescaler ÷256, 16-bit result, no digital correction, single conversion.
const CTRLB_CONFIG: u32 = 0x610;

/// `SAMPCTRL`: maximum sampling time, for high input impedance sources.
const SAMPCTRL_MAX: u32 = 0x3f;

/// `AVGCTRL`: accumulate 1024 samples.
const AVGCTRL_ACCUMULATE_1024: u32 = 0x0a;

const CTRLA_SWRST: u32 = 1 << 0;
const CTRLA_ENABLE: u32 = 1 << 1;
const REFCTRL_REFSEL_MASK: u32 = 0x0f;
const SWTRIG_START: u32 = 1 << 1;
const INTFLAG_RESRDY: u32 = 1 << 0;
const STATUS_SYNCBUSY: u32 = 1 << 7;

const INPUTCTRL_MUXPOS_MASK: u32 = 0x1f;
const INPUTCTRL_MUXNEG_SHIFT: u32 = 8;
const INPUTCTRL_GAIN_SHIFT: u32 = 24;

/// Internal channel carrying the on-die temperature sensor.
///
/// Also used for the throw-away conversion at the end of initialisation.
pub const TEMPERATURE_CHANNEL: u8 = 0x18;

/// Negative input: internal ground.
const MUXNEG_GND: u8 = 0x18;

/// Negative input: I/O ground.
const MUXNEG_IOGND: u8 = 0x19;

/// ADC registers used by this driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    CtrlA,
    RefCtrl,
    AvgCtrl,
    SampCtrl,
    CtrlB,
    SwTrig,
    InputCtrl,
    IntFlag,
    Status,
    Result,
}

/// Access to the ADC's registers and the few bits of the system controllers it depends on.
///
/// Values are passed as `u32` regardless of the register width; implementations truncate on write
/// and zero-extend on read.
pub trait AdcRegisters {
    fn read(&self, register: Register) -> u32;

    fn write(&mut self, register: Register, value: u32);

    /// Read-modify-write of a single register.
    fn modify(&mut self, register: Register, f: impl FnOnce(u32) -> u32) {
        let value = self.read(register);
        self.write(register, f(value));
    }

    /// Enables the ADC's bus clock and routes a generic clock to its conversion clock.
    fn enable_clocks(&mut self);

    /// Routes the on-die temperature sensor to [`TEMPERATURE_CHANNEL`].
    fn enable_temperature_sensor(&mut self);
}

/// ADC error
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A register write did not synchronize in time.
    #[error("ADC register synchronization timed out")]
    SyncTimeout,
    /// The software reset did not complete in time.
    #[error("ADC software reset timed out")]
    ResetTimeout,
    /// The result-ready flag was never raised.
    #[error("ADC conversion timed out")]
    ConversionTimeout,
}

/// Voltage reference for a conversion.
///
/// Each reference comes with a matching gain so that the full-scale input range is about 1.0 V
/// either way.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reference {
    /// Internal 1.0 V bandgap reference, unity gain. For internal measurements.
    Internal1V,
    /// Half of VDDANA as reference, gain ÷2. For external signals up to the supply rail.
    HalfSupply,
}

/// Input stage gain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gain {
    /// ×1
    X1,
    /// ×0.5
    Div2,
}

impl Gain {
    const fn bits(self) -> u32 {
        match self {
            Gain::X1 => 0x0,
            Gain::Div2 => 0xf,
        }
    }
}

impl Reference {
    /// The gain that goes with this reference.
    pub const fn gain(self) -> Gain {
        match self {
            Reference::Internal1V => Gain::X1,
            Reference::HalfSupply => Gain::Div2,
        }
    }

    const fn refsel(self) -> u32 {
        match self {
            // INT1V
            Reference::Internal1V => 0x0,
            // INTVCC1
            Reference::HalfSupply => 0x2,
        }
    }

    const fn negative_input(self) -> u8 {
        match self {
            Reference::Internal1V => MUXNEG_GND,
            Reference::HalfSupply => MUXNEG_IOGND,
        }
    }
}

/// `INPUTCTRL` value selecting `channel` against the ground of `reference`'s domain.
///
/// The gain lives in the same register, so it is written together with the mux selection.
const fn input_control(channel: u8, reference: Reference) -> u32 {
    (channel as u32 & INPUTCTRL_MUXPOS_MASK)
        | (reference.negative_input() as u32) << INPUTCTRL_MUXNEG_SHIFT
        | reference.gain().bits() << INPUTCTRL_GAIN_SHIFT
}

/// ADC configuration
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Applies to every synchronization, reset and result-ready poll.
    pub timeout: Timeout,
}

impl Config {
    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }
}

/// ADC driver
pub struct Adc<R> {
    regs: R,
    config: Config,
}

impl<R: AdcRegisters> Adc<R> {
    /// Takes ownership of the ADC registers and initialises the peripheral.
    pub fn new(regs: R, config: Config) -> Result<Self, Error> {
        let mut adc = Self { regs, config };
        adc.initialize()?;
        Ok(adc)
    }

    /// Releases the ADC registers. The ADC is already disabled between conversions.
    pub fn release(self) -> R {
        self.regs
    }

    /// Returns the register handle, e.g. for other drivers sharing the analog front end.
    pub fn registers(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Enables clocks, resets the ADC and programs prescaler, resolution, accumulation and sample
    /// time. Ends with one discarded conversion so the reference can settle.
    pub fn initialize(&mut self) -> Result<(), Error> {
        self.regs.enable_clocks();
        self.reset()?;

        self.regs.write(Register::CtrlB, CTRLB_CONFIG);
        self.wait_sync()?;
        self.regs.write(Register::SampCtrl, SAMPCTRL_MAX);
        self.wait_sync()?;
        self.regs.write(Register::AvgCtrl, AVGCTRL_ACCUMULATE_1024);
        self.wait_sync()?;

        let _ = self.read_channel(TEMPERATURE_CHANNEL, Reference::Internal1V)?;
        debug!("ADC initialized");
        Ok(())
    }

    /// Disables the ADC and resets it to its power-on configuration.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.disable()?;
        self.regs.modify(Register::CtrlA, |v| v | CTRLA_SWRST);
        self.wait_sync()?;

        let regs = &self.regs;
        wait_while(self.config.timeout, || {
            regs.read(Register::CtrlA) & CTRLA_SWRST != 0
        })
        .map_err(|_| Error::ResetTimeout)
    }

    /// Performs one blocking conversion of `channel`.
    ///
    /// The channel number is not checked; what an unused mux position returns is up to the
    /// hardware. The ADC is disabled again afterwards, also when the conversion failed.
    pub fn read_channel(&mut self, channel: u8, reference: Reference) -> Result<u16, Error> {
        self.select_input(channel, reference)?;

        self.regs.modify(Register::CtrlA, |v| v | CTRLA_ENABLE);
        let sample = self.wait_sync().and_then(|()| self.convert());
        let disabled = self.disable();
        if sample.is_err() {
            warn!("ADC conversion on channel {} failed", channel);
        }
        let sample = sample?;
        disabled?;

        trace!("ADC channel {} -> {}", channel, sample);
        Ok(sample)
    }

    fn select_input(&mut self, channel: u8, reference: Reference) -> Result<(), Error> {
        self.regs.modify(Register::RefCtrl, |v| {
            (v & !REFCTRL_REFSEL_MASK) | reference.refsel()
        });
        self.wait_sync()?;
        self.regs
            .write(Register::InputCtrl, input_control(channel, reference));
        self.wait_sync()?;

        // Some configuration paths reset the sample time.
        self.regs.write(Register::SampCtrl, SAMPCTRL_MAX);
        self.wait_sync()
    }

    fn convert(&mut self) -> Result<u16, Error> {
        self.regs.write(Register::SwTrig, SWTRIG_START);

        let regs = &self.regs;
        wait_while(self.config.timeout, || {
            regs.read(Register::IntFlag) & INTFLAG_RESRDY == 0
        })
        .map_err(|_| Error::ConversionTimeout)?;
        self.wait_sync()?;

        let sample = self.regs.read(Register::Result) as u16;
        self.regs.write(Register::IntFlag, INTFLAG_RESRDY);
        self.wait_sync()?;
        Ok(sample)
    }

    /// Clears ENABLE even if a previous write is still synchronizing.
    fn disable(&mut self) -> Result<(), Error> {
        let synced = self.wait_sync();
        self.regs.modify(Register::CtrlA, |v| v & !CTRLA_ENABLE);
        synced.and(self.wait_sync())
    }

    fn wait_sync(&self) -> Result<(), Error> {
        wait_while(self.config.timeout, || {
            self.regs.read(Register::Status) & STATUS_SYNCBUSY != 0
        })
        .map_err(|_| Error::SyncTimeout)
    }
}

/// Internal temperature sensor (ADC channel 0x18)
#[derive(Debug, Default)]
pub struct TemperatureChannel;

#[cfg(feature = "embedded-hal-02")]
impl<R> embedded_hal_02::adc::Channel<Adc<R>> for TemperatureChannel {
    type ID = u8;

    fn channel() -> u8 {
        TEMPERATURE_CHANNEL
    }
}

/// One-shot conversions against the internal 1.0 V reference.
#[cfg(feature = "embedded-hal-02")]
impl<R, WORD, PIN> embedded_hal_02::adc::OneShot<Adc<R>, WORD, PIN> for Adc<R>
where
    R: AdcRegisters,
    WORD: From<u16>,
    PIN: embedded_hal_02::adc::Channel<Adc<R>, ID = u8>,
{
    type Error = Error;

    fn read(&mut self, _pin: &mut PIN) -> nb::Result<WORD, Self::Error> {
        self.read_channel(PIN::channel(), Reference::Internal1V)
            .map(Into::into)
            .map_err(nb::Error::Other)
    }
}
