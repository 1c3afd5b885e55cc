// Copyright 2026 The samd21-retick authors.
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # SAM D21 register access
//!
//! Memory-mapped implementations of [`AdcRegisters`], [`TimerRegisters`], [`InterruptLine`],
//! [`FactoryCalibration`] and [`Idle`](crate::tick::Idle) for the SAM D21 family. The tick timer
//! is `TCC1`, whose counter is 24 bits wide.
//!
//! The handles are zero-sized and are handed out once by [`Peripherals::take`]. Interrupt handlers
//! that need the timer registers use [`Tcc1::steal`].

use core::hint::spin_loop;
use core::mem::offset_of;

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;
use portable_atomic::{AtomicBool, Ordering};
use vcell::VolatileCell;

use crate::adc::{self, AdcRegisters};
use crate::temperature::{Calibration, FactoryCalibration};
use crate::tick::{self, InterruptLine, TimerRegisters};

const PM_BASE: usize = 0x4000_0400;
const SYSCTRL_BASE: usize = 0x4000_0800;
const GCLK_BASE: usize = 0x4000_0c00;
const TCC1_BASE: usize = 0x4200_2400;
const ADC_BASE: usize = 0x4200_4000;

/// NVM software calibration area: temperature log.
const NVM_TEMPERATURE_LOG: usize = 0x0080_6030;

const PM_APBCMASK_TCC1: u32 = 1 << 9;
const PM_APBCMASK_ADC: u32 = 1 << 16;

const GCLK_STATUS_SYNCBUSY: u8 = 1 << 7;
const GCLK_CLKCTRL_GEN_GCLK0: u16 = 0 << 8;
const GCLK_CLKCTRL_CLKEN: u16 = 1 << 14;
const GCM_TCC0_TCC1: u16 = 0x1a;
const GCM_ADC: u16 = 0x1e;

const SYSCTRL_VREF_TSEN: u32 = 1 << 1;

/// Number of NVIC priority bits implemented by the Cortex-M0+ in the SAM D21.
const NVIC_PRIO_BITS: u8 = 2;

#[repr(C)]
struct PmRegisterBlock {
    _reserved0: [u8; 0x20],
    apbcmask: VolatileCell<u32>,
}

#[repr(C)]
struct SysctrlRegisterBlock {
    _reserved0: [u8; 0x40],
    vref: VolatileCell<u32>,
}

#[repr(C)]
struct GclkRegisterBlock {
    _reserved0: [u8; 1],
    status: VolatileCell<u8>,
    clkctrl: VolatileCell<u16>,
}

#[repr(C)]
struct AdcRegisterBlock {
    ctrla: VolatileCell<u8>,
    refctrl: VolatileCell<u8>,
    avgctrl: VolatileCell<u8>,
    sampctrl: VolatileCell<u8>,
    ctrlb: VolatileCell<u16>,
    _reserved0: [u8; 6],
    swtrig: VolatileCell<u8>,
    _reserved1: [u8; 3],
    inputctrl: VolatileCell<u32>,
    _reserved2: [u8; 4],
    intflag: VolatileCell<u8>,
    status: VolatileCell<u8>,
    result: VolatileCell<u16>,
}

#[repr(C)]
struct TccRegisterBlock {
    ctrla: VolatileCell<u32>,
    _reserved0: [u8; 4],
    syncbusy: VolatileCell<u32>,
    _reserved1: [u8; 0x14],
    evctrl: VolatileCell<u32>,
    _reserved2: [u8; 4],
    intenset: VolatileCell<u32>,
    intflag: VolatileCell<u32>,
    _reserved3: [u8; 4],
    count: VolatileCell<u32>,
    _reserved4: [u8; 8],
    per: VolatileCell<u32>,
}

const _: () = {
    assert!(offset_of!(PmRegisterBlock, apbcmask) == 0x20);
    assert!(offset_of!(SysctrlRegisterBlock, vref) == 0x40);
    assert!(offset_of!(GclkRegisterBlock, status) == 0x01);
    assert!(offset_of!(GclkRegisterBlock, clkctrl) == 0x02);
    assert!(offset_of!(AdcRegisterBlock, ctrlb) == 0x04);
    assert!(offset_of!(AdcRegisterBlock, swtrig) == 0x0c);
    assert!(offset_of!(AdcRegisterBlock, inputctrl) == 0x10);
    assert!(offset_of!(AdcRegisterBlock, intflag) == 0x18);
    assert!(offset_of!(AdcRegisterBlock, result) == 0x1a);
    assert!(offset_of!(TccRegisterBlock, syncbusy) == 0x08);
    assert!(offset_of!(TccRegisterBlock, evctrl) == 0x20);
    assert!(offset_of!(TccRegisterBlock, intenset) == 0x28);
    assert!(offset_of!(TccRegisterBlock, intflag) == 0x2c);
    assert!(offset_of!(TccRegisterBlock, count) == 0x34);
    assert!(offset_of!(TccRegisterBlock, per) == 0x40);
};

fn pm() -> &'static PmRegisterBlock {
    unsafe { &*(PM_BASE as *const PmRegisterBlock) }
}

fn sysctrl() -> &'static SysctrlRegisterBlock {
    unsafe { &*(SYSCTRL_BASE as *const SysctrlRegisterBlock) }
}

fn gclk() -> &'static GclkRegisterBlock {
    unsafe { &*(GCLK_BASE as *const GclkRegisterBlock) }
}

fn adc() -> &'static AdcRegisterBlock {
    unsafe { &*(ADC_BASE as *const AdcRegisterBlock) }
}

fn tcc1() -> &'static TccRegisterBlock {
    unsafe { &*(TCC1_BASE as *const TccRegisterBlock) }
}

fn enable_apbc(mask: u32) {
    let pm = pm();
    pm.apbcmask.set(pm.apbcmask.get() | mask);
}

/// Feeds GCLK0 to the peripheral channel `id`.
fn route_gclk0(id: u16) {
    let gclk = gclk();
    gclk.clkctrl
        .set(id | GCLK_CLKCTRL_GEN_GCLK0 | GCLK_CLKCTRL_CLKEN);
    while gclk.status.get() & GCLK_STATUS_SYNCBUSY != 0 {
        spin_loop();
    }
}

/// Device interrupt lines used here.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Interrupt {
    TCC1 = 16,
}

unsafe impl InterruptNumber for Interrupt {
    fn number(self) -> u16 {
        self as u16
    }
}

/// The ADC, together with the clock and `SYSCTRL` bits it needs.
pub struct AdcPeripheral {
    _private: (),
}

impl AdcRegisters for AdcPeripheral {
    fn read(&self, register: adc::Register) -> u32 {
        let rb = adc();
        match register {
            adc::Register::CtrlA => rb.ctrla.get().into(),
            adc::Register::RefCtrl => rb.refctrl.get().into(),
            adc::Register::AvgCtrl => rb.avgctrl.get().into(),
            adc::Register::SampCtrl => rb.sampctrl.get().into(),
            adc::Register::CtrlB => rb.ctrlb.get().into(),
            adc::Register::SwTrig => rb.swtrig.get().into(),
            adc::Register::InputCtrl => rb.inputctrl.get(),
            adc::Register::IntFlag => rb.intflag.get().into(),
            adc::Register::Status => rb.status.get().into(),
            adc::Register::Result => rb.result.get().into(),
        }
    }

    fn write(&mut self, register: adc::Register, value: u32) {
        let rb = adc();
        match register {
            adc::Register::CtrlA => rb.ctrla.set(value as u8),
            adc::Register::RefCtrl => rb.refctrl.set(value as u8),
            adc::Register::AvgCtrl => rb.avgctrl.set(value as u8),
            adc::Register::SampCtrl => rb.sampctrl.set(value as u8),
            adc::Register::CtrlB => rb.ctrlb.set(value as u16),
            adc::Register::SwTrig => rb.swtrig.set(value as u8),
            adc::Register::InputCtrl => rb.inputctrl.set(value),
            adc::Register::IntFlag => rb.intflag.set(value as u8),
            adc::Register::Status => rb.status.set(value as u8),
            adc::Register::Result => rb.result.set(value as u16),
        }
    }

    fn enable_clocks(&mut self) {
        enable_apbc(PM_APBCMASK_ADC);
        route_gclk0(GCM_ADC);
    }

    fn enable_temperature_sensor(&mut self) {
        let sysctrl = sysctrl();
        sysctrl.vref.set(sysctrl.vref.get() | SYSCTRL_VREF_TSEN);
    }
}

/// Timer/counter `TCC1`.
pub struct Tcc1 {
    _private: (),
}

impl Tcc1 {
    /// Creates another handle to `TCC1`, for use in its interrupt handler.
    ///
    /// # Safety
    ///
    /// The handler may only clear the counter flag, as [`tick::on_interrupt`] does; everything else
    /// belongs to the [`TickScheduler`](crate::tick::TickScheduler) owning the real handle.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl TimerRegisters for Tcc1 {
    fn read(&self, register: tick::Register) -> u32 {
        let rb = tcc1();
        match register {
            tick::Register::CtrlA => rb.ctrla.get(),
            tick::Register::SyncBusy => rb.syncbusy.get(),
            tick::Register::EvCtrl => rb.evctrl.get(),
            tick::Register::IntEnSet => rb.intenset.get(),
            tick::Register::IntFlag => rb.intflag.get(),
            tick::Register::Count => rb.count.get(),
            tick::Register::Per => rb.per.get(),
        }
    }

    fn write(&mut self, register: tick::Register, value: u32) {
        let rb = tcc1();
        match register {
            tick::Register::CtrlA => rb.ctrla.set(value),
            tick::Register::SyncBusy => rb.syncbusy.set(value),
            tick::Register::EvCtrl => rb.evctrl.set(value),
            tick::Register::IntEnSet => rb.intenset.set(value),
            tick::Register::IntFlag => rb.intflag.set(value),
            tick::Register::Count => rb.count.set(value),
            tick::Register::Per => rb.per.set(value),
        }
    }

    fn enable_clock(&mut self) {
        enable_apbc(PM_APBCMASK_TCC1);
        route_gclk0(GCM_TCC0_TCC1);
    }
}

/// NVIC line of `TCC1`.
#[derive(Copy, Clone, Debug)]
pub struct Tcc1Interrupt;

impl InterruptLine for Tcc1Interrupt {
    fn unpend(&mut self) {
        NVIC::unpend(Interrupt::TCC1);
    }

    fn enable(&mut self, priority: u8) {
        let priority = priority.min((1 << NVIC_PRIO_BITS) - 1) << (8 - NVIC_PRIO_BITS);
        unsafe {
            let mut nvic = cortex_m::Peripherals::steal().NVIC;
            nvic.set_priority(Interrupt::TCC1, priority);
            NVIC::unmask(Interrupt::TCC1);
        }
    }
}

/// Factory temperature calibration in the NVM software calibration area.
#[derive(Copy, Clone, Debug)]
pub struct NvmTemperatureLog;

impl FactoryCalibration for NvmTemperatureLog {
    fn calibration(&self) -> Calibration {
        let log = NVM_TEMPERATURE_LOG as *const u32;
        let words = unsafe { [log.read_volatile(), log.add(1).read_volatile()] };
        Calibration::from_words(words)
    }
}

/// Sleeps with `WFI` until the next interrupt.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[derive(Copy, Clone, Debug)]
pub struct Wfi;

#[cfg(all(target_arch = "arm", target_os = "none"))]
impl crate::tick::Idle for Wfi {
    fn wait(&mut self) {
        cortex_m::asm::wfi();
    }
}

static TAKEN: AtomicBool = AtomicBool::new(false);

/// The peripherals used by this crate.
pub struct Peripherals {
    pub adc: AdcPeripheral,
    pub tcc1: Tcc1,
    pub tcc1_interrupt: Tcc1Interrupt,
    pub temperature_log: NvmTemperatureLog,
}

impl Peripherals {
    /// Returns the peripherals the first time it is called, `None` afterwards.
    pub fn take() -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(unsafe { Self::steal() })
        }
    }

    /// Returns the peripherals regardless of whether they were taken already.
    ///
    /// # Safety
    ///
    /// Two owners of the same peripheral will corrupt each other's configuration.
    pub unsafe fn steal() -> Self {
        TAKEN.store(true, Ordering::Release);
        Self {
            adc: AdcPeripheral { _private: () },
            tcc1: Tcc1 { _private: () },
            tcc1_interrupt: Tcc1Interrupt,
            temperature_log: NvmTemperatureLog,
        }
    }
}
