// Copyright 2026 The samd21-retick authors.
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # On-die temperature sensor
//!
//! The sensor output is read through the ADC on [`TEMPERATURE_CHANNEL`] against the internal
//! 1.0 V reference, and converted to millidegrees Celsius with a two-point linear fit through the
//! factory calibration points stored in the NVM temperature log.

use crate::adc::{self, Adc, AdcRegisters, Reference, TEMPERATURE_CHANNEL};

/// Temperature sensor error
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error(transparent)]
    Adc(#[from] adc::Error),
    /// Both calibration points have the same ADC code, e.g. because the NVM row is erased.
    #[error("Room and hot calibration points have the same ADC code")]
    DegenerateCalibration,
}

/// One factory calibration point.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationPoint {
    /// ADC code at this temperature, already scaled to the 16-bit accumulated range.
    pub adc: u16,
    /// Whole degrees Celsius.
    pub integer: u8,
    /// Fractional part, a 4-bit value.
    pub fraction: u8,
}

impl CalibrationPoint {
    /// The calibration temperature in millidegrees.
    pub fn millidegrees(&self, step: FractionStep) -> i32 {
        let fraction = i32::from(self.fraction & 0x0f);
        let fraction = match step {
            FractionStep::Tenths => 100 * fraction,
            FractionStep::Sixteenths => fraction * 1000 / 16,
        };
        1000 * i32::from(self.integer) + fraction
    }
}

/// Room and hot calibration points.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub room: CalibrationPoint,
    pub hot: CalibrationPoint,
}

impl Calibration {
    /// Unpacks the first two words of the NVM temperature log.
    ///
    /// ```text
    /// word 0: [7:0] room integer, [11:8] room fraction, [19:12] hot integer, [23:20] hot fraction
    /// word 1: [19:8] room ADC code, [31:20] hot ADC code
    /// ```
    ///
    /// The 12-bit ADC codes are shifted left by 4 to match the accumulated 16-bit samples.
    pub fn from_words(words: [u32; 2]) -> Self {
        let [log0, log1] = words;
        Self {
            room: CalibrationPoint {
                adc: (((log1 >> 8) & 0xfff) << 4) as u16,
                integer: (log0 & 0xff) as u8,
                fraction: ((log0 >> 8) & 0x0f) as u8,
            },
            hot: CalibrationPoint {
                adc: (((log1 >> 20) & 0xfff) << 4) as u16,
                integer: ((log0 >> 12) & 0xff) as u8,
                fraction: ((log0 >> 20) & 0x0f) as u8,
            },
        }
    }

    /// Converts a raw accumulated sample to millidegrees Celsius.
    ///
    /// Samples outside the calibrated range are extrapolated along the same line. Division
    /// truncates towards zero.
    pub fn millidegrees(&self, raw: u16, step: FractionStep) -> Result<i32, Error> {
        let room_adc = i64::from(self.room.adc);
        let hot_adc = i64::from(self.hot.adc);
        if hot_adc == room_adc {
            return Err(Error::DegenerateCalibration);
        }
        let room = i64::from(self.room.millidegrees(step));
        let hot = i64::from(self.hot.millidegrees(step));

        let mdeg = room + (hot - room) * (i64::from(raw) - room_adc) / (hot_adc - room_adc);
        // Only a nonsensical calibration can leave the i32 range.
        Ok(mdeg.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }
}

/// Source of the factory calibration, consulted at every conversion.
pub trait FactoryCalibration {
    fn calibration(&self) -> Calibration;
}

impl FactoryCalibration for Calibration {
    fn calibration(&self) -> Calibration {
        *self
    }
}

/// How the 4-bit fractional calibration field is scaled to millidegrees.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FractionStep {
    /// 100 m°C per step: the field holds tenths of a degree.
    #[default]
    Tenths,
    /// 62.5 m°C per step, truncated: the field holds sixteenths of a degree.
    Sixteenths,
}

/// Temperature sensor configuration
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub adc: adc::Config,
    pub fraction: FractionStep,
}

impl Config {
    pub fn adc(mut self, adc: adc::Config) -> Self {
        self.adc = adc;
        self
    }

    pub fn fraction(mut self, fraction: FractionStep) -> Self {
        self.fraction = fraction;
        self
    }
}

/// Temperature sensor, owning the ADC it is read through.
pub struct TemperatureSensor<R, C> {
    adc: Adc<R>,
    calibration: C,
    fraction: FractionStep,
}

impl<R: AdcRegisters, C: FactoryCalibration> TemperatureSensor<R, C> {
    /// Enables the sensor and initialises the ADC.
    pub fn new(mut regs: R, calibration: C, config: Config) -> Result<Self, Error> {
        regs.enable_temperature_sensor();
        let adc = Adc::new(regs, config.adc)?;
        Ok(Self {
            adc,
            calibration,
            fraction: config.fraction,
        })
    }

    /// Re-enables the sensor output and re-initialises the ADC.
    pub fn initialize(&mut self) -> Result<(), Error> {
        self.adc.registers().enable_temperature_sensor();
        self.adc.initialize()?;
        Ok(())
    }

    /// The ADC, for conversions on other channels.
    pub fn adc(&mut self) -> &mut Adc<R> {
        &mut self.adc
    }

    pub fn release(self) -> (R, C) {
        (self.adc.release(), self.calibration)
    }

    /// Reads the raw sensor voltage, a 16-bit value spanning 0 to 1.0 V.
    pub fn read_raw(&mut self) -> Result<u16, Error> {
        Ok(self
            .adc
            .read_channel(TEMPERATURE_CHANNEL, Reference::Internal1V)?)
    }

    /// Converts a raw reading to millidegrees Celsius using the factory calibration.
    pub fn raw_to_millidegrees(&self, raw: u16) -> Result<i32, Error> {
        self.calibration
            .calibration()
            .millidegrees(raw, self.fraction)
    }

    /// Reads the sensor and returns millidegrees Celsius.
    pub fn read_millidegrees(&mut self) -> Result<i32, Error> {
        let raw = self.read_raw()?;
        self.raw_to_millidegrees(raw)
    }
}
