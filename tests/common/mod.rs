// Copyright 2026 The samd21-retick authors.
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Simulated SAM D21 peripherals.
//!
//! The handles share their state through `Rc<RefCell<_>>`, so a test can keep a clone for
//! inspection after moving another clone into a driver.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use samd21_retick::adc::{self, AdcRegisters};
use samd21_retick::sync::Timeout;
use samd21_retick::tick::{self, Idle, InterruptLine, TickFlag, TimerRegisters};

pub const ADC_CTRLA_SWRST: u32 = 1 << 0;
pub const ADC_CTRLA_ENABLE: u32 = 1 << 1;
pub const ADC_STATUS_SYNCBUSY: u32 = 1 << 7;
pub const ADC_INTFLAG_RESRDY: u32 = 1 << 0;
pub const ADC_SWTRIG_START: u32 = 1 << 1;

pub const TCC_CTRLA_SWRST: u32 = 1 << 0;
pub const TCC_CTRLA_ENABLE: u32 = 1 << 1;
pub const TCC_INT_CNT: u32 = 1 << 2;

/// Number of result-ready polls before a conversion completes.
const CONVERSION_POLLS: u32 = 3;

/// Number of `CTRLA` reads during which a software reset is still in progress.
const RESET_POLLS: u32 = 2;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AdcOp {
    EnableClocks,
    EnableTemperatureSensor,
    Write(adc::Register, u32),
}

/// Register contents at the moment a conversion was started.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Conversion {
    pub refctrl: u32,
    pub inputctrl: u32,
    pub sampctrl: u32,
    pub avgctrl: u32,
    pub ctrlb: u32,
}

#[derive(Default)]
struct AdcState {
    regs: [u32; 10],
    ops: Vec<AdcOp>,
    sync_polls: u32,
    enable_sync_polls: u32,
    unsynced_writes: u32,
    reset_polls: u32,
    stuck_reset: bool,
    pending_conversion: Option<u32>,
    samples: VecDeque<u16>,
    conversions: Vec<Conversion>,
    stuck_conversion: bool,
    stuck_sync: bool,
}

#[derive(Clone, Default)]
pub struct SimAdc(Rc<RefCell<AdcState>>);

impl SimAdc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues results for the next conversions. Conversions beyond the queue return 0.
    pub fn push_samples(&self, samples: &[u16]) {
        self.0.borrow_mut().samples.extend(samples.iter().copied());
    }

    pub fn ops(&self) -> Vec<AdcOp> {
        self.0.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.0.borrow_mut().ops.clear();
    }

    pub fn conversions(&self) -> Vec<Conversion> {
        self.0.borrow().conversions.clone()
    }

    pub fn register(&self, register: adc::Register) -> u32 {
        self.0.borrow().regs[register as usize]
    }

    pub fn is_enabled(&self) -> bool {
        self.register(adc::Register::CtrlA) & ADC_CTRLA_ENABLE != 0
    }

    /// Writes issued while a previous write was still synchronizing.
    pub fn unsynced_writes(&self) -> u32 {
        self.0.borrow().unsynced_writes
    }

    pub fn set_stuck_conversion(&self, stuck: bool) {
        self.0.borrow_mut().stuck_conversion = stuck;
    }

    pub fn set_stuck_sync(&self, stuck: bool) {
        self.0.borrow_mut().stuck_sync = stuck;
    }

    /// Keeps SYNCBUSY set for `polls` status reads after each write that sets ENABLE.
    pub fn set_enable_sync_polls(&self, polls: u32) {
        self.0.borrow_mut().enable_sync_polls = polls;
    }

    /// Makes SWRST never clear.
    pub fn set_stuck_reset(&self, stuck: bool) {
        self.0.borrow_mut().stuck_reset = stuck;
    }
}

impl AdcRegisters for SimAdc {
    fn read(&self, register: adc::Register) -> u32 {
        let mut s = self.0.borrow_mut();
        match register {
            adc::Register::Status => {
                if s.stuck_sync {
                    return ADC_STATUS_SYNCBUSY;
                }
                if s.sync_polls == 0 {
                    return 0;
                }
                s.sync_polls -= 1;
                ADC_STATUS_SYNCBUSY
            }
            adc::Register::CtrlA => {
                if s.reset_polls > 0 && !s.stuck_reset {
                    s.reset_polls -= 1;
                    if s.reset_polls == 0 {
                        s.regs[adc::Register::CtrlA as usize] &= !ADC_CTRLA_SWRST;
                    }
                }
                s.regs[adc::Register::CtrlA as usize]
            }
            adc::Register::IntFlag => {
                if let Some(polls) = s.pending_conversion {
                    if polls == 0 {
                        let sample = s.samples.pop_front().unwrap_or(0);
                        s.regs[adc::Register::Result as usize] = u32::from(sample);
                        s.regs[adc::Register::IntFlag as usize] |= ADC_INTFLAG_RESRDY;
                        s.pending_conversion = None;
                    } else {
                        s.pending_conversion = Some(polls - 1);
                    }
                }
                s.regs[adc::Register::IntFlag as usize]
            }
            other => s.regs[other as usize],
        }
    }

    fn write(&mut self, register: adc::Register, value: u32) {
        let mut s = self.0.borrow_mut();
        s.ops.push(AdcOp::Write(register, value));
        if s.sync_polls > 0 {
            s.unsynced_writes += 1;
        }
        s.sync_polls = 1;
        match register {
            adc::Register::CtrlA if value & ADC_CTRLA_SWRST != 0 => {
                s.regs = [0; 10];
                s.regs[adc::Register::CtrlA as usize] = ADC_CTRLA_SWRST;
                s.reset_polls = RESET_POLLS;
            }
            adc::Register::CtrlA => {
                if value & ADC_CTRLA_ENABLE != 0 && s.enable_sync_polls > 0 {
                    s.sync_polls = s.enable_sync_polls;
                }
                s.regs[adc::Register::CtrlA as usize] = value;
            }
            adc::Register::SwTrig => {
                let enabled = s.regs[adc::Register::CtrlA as usize] & ADC_CTRLA_ENABLE != 0;
                if value & ADC_SWTRIG_START != 0 && enabled {
                    let conversion = Conversion {
                        refctrl: s.regs[adc::Register::RefCtrl as usize],
                        inputctrl: s.regs[adc::Register::InputCtrl as usize],
                        sampctrl: s.regs[adc::Register::SampCtrl as usize],
                        avgctrl: s.regs[adc::Register::AvgCtrl as usize],
                        ctrlb: s.regs[adc::Register::CtrlB as usize],
                    };
                    s.conversions.push(conversion);
                    if !s.stuck_conversion {
                        s.pending_conversion = Some(CONVERSION_POLLS);
                    }
                }
            }
            adc::Register::IntFlag => {
                s.regs[adc::Register::IntFlag as usize] &= !value;
            }
            other => s.regs[other as usize] = value,
        }
    }

    fn enable_clocks(&mut self) {
        self.0.borrow_mut().ops.push(AdcOp::EnableClocks);
    }

    fn enable_temperature_sensor(&mut self) {
        self.0.borrow_mut().ops.push(AdcOp::EnableTemperatureSensor);
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerOp {
    EnableClock,
    Write(tick::Register, u32),
}

#[derive(Default)]
struct TimerState {
    regs: [u32; 7],
    ops: Vec<TimerOp>,
    sync_busy: bool,
    unsynced_writes: u32,
    stuck_sync: bool,
    undivided: u64,
    irq: bool,
}

/// `TCC1` with a 24-bit counter, counting from 0 to `PER` and raising the counter interrupt on
/// each wrap.
#[derive(Clone, Default)]
pub struct SimTimer(Rc<RefCell<TimerState>>);

impl SimTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<TimerOp> {
        self.0.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.0.borrow_mut().ops.clear();
    }

    pub fn register(&self, register: tick::Register) -> u32 {
        self.0.borrow().regs[register as usize]
    }

    pub fn is_enabled(&self) -> bool {
        self.register(tick::Register::CtrlA) & TCC_CTRLA_ENABLE != 0
    }

    /// The `PRESCALER` field of `CTRLA`.
    pub fn prescaler(&self) -> u32 {
        (self.register(tick::Register::CtrlA) >> 8) & 0x7
    }

    pub fn unsynced_writes(&self) -> u32 {
        self.0.borrow().unsynced_writes
    }

    pub fn set_stuck_sync(&self, stuck: bool) {
        self.0.borrow_mut().stuck_sync = stuck;
    }

    /// Feeds `clocks` cycles of the undivided generic clock. Returns the number of counter wraps.
    pub fn advance(&self, clocks: u64) -> u64 {
        let mut s = self.0.borrow_mut();
        let ctrla = s.regs[tick::Register::CtrlA as usize];
        if ctrla & TCC_CTRLA_ENABLE == 0 {
            return 0;
        }
        const SHIFTS: [u32; 8] = [0, 1, 2, 3, 4, 6, 8, 10];
        let shift = SHIFTS[((ctrla >> 8) & 0x7) as usize];

        s.undivided += clocks;
        let ticks = s.undivided >> shift;
        s.undivided &= (1 << shift) - 1;

        let span = u64::from(s.regs[tick::Register::Per as usize]) + 1;
        let total = u64::from(s.regs[tick::Register::Count as usize]) + ticks;
        let wraps = total / span;
        s.regs[tick::Register::Count as usize] = (total % span) as u32;
        if wraps > 0 {
            s.regs[tick::Register::IntFlag as usize] |= TCC_INT_CNT;
            if s.regs[tick::Register::IntEnSet as usize] & TCC_INT_CNT != 0 {
                s.irq = true;
            }
        }
        wraps
    }

    /// Returns whether the counter interrupt was raised since the last call.
    pub fn take_irq(&self) -> bool {
        std::mem::take(&mut self.0.borrow_mut().irq)
    }
}

impl TimerRegisters for SimTimer {
    fn read(&self, register: tick::Register) -> u32 {
        let mut s = self.0.borrow_mut();
        match register {
            tick::Register::SyncBusy => {
                if s.stuck_sync {
                    return 1;
                }
                let busy = s.sync_busy;
                s.sync_busy = false;
                u32::from(busy)
            }
            other => s.regs[other as usize],
        }
    }

    fn write(&mut self, register: tick::Register, value: u32) {
        let mut s = self.0.borrow_mut();
        s.ops.push(TimerOp::Write(register, value));
        if s.sync_busy {
            s.unsynced_writes += 1;
        }
        s.sync_busy = true;
        match register {
            tick::Register::CtrlA if value & TCC_CTRLA_SWRST != 0 => {
                s.regs = [0; 7];
                s.undivided = 0;
            }
            tick::Register::IntFlag => {
                s.regs[tick::Register::IntFlag as usize] &= !value;
            }
            tick::Register::IntEnSet => {
                s.regs[tick::Register::IntEnSet as usize] |= value;
            }
            tick::Register::Count => {
                s.regs[tick::Register::Count as usize] = value & 0x00ff_ffff;
                s.undivided = 0;
            }
            other => s.regs[other as usize] = value,
        }
    }

    fn enable_clock(&mut self) {
        self.0.borrow_mut().ops.push(TimerOp::EnableClock);
    }
}

#[derive(Default)]
struct LineState {
    pending: bool,
    enabled: bool,
    priority: Option<u8>,
    unpends: u32,
}

#[derive(Clone, Default)]
pub struct SimLine(Rc<RefCell<LineState>>);

impl SimLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.borrow_mut().pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.0.borrow().pending
    }

    pub fn is_enabled(&self) -> bool {
        self.0.borrow().enabled
    }

    pub fn priority(&self) -> Option<u8> {
        self.0.borrow().priority
    }

    pub fn unpends(&self) -> u32 {
        self.0.borrow().unpends
    }
}

impl InterruptLine for SimLine {
    fn unpend(&mut self) {
        let mut s = self.0.borrow_mut();
        s.pending = false;
        s.unpends += 1;
    }

    fn enable(&mut self, priority: u8) {
        let mut s = self.0.borrow_mut();
        s.enabled = true;
        s.priority = Some(priority);
    }
}

/// Delivers a raised timer interrupt the way the NVIC would: through the handler.
pub fn deliver_interrupt(timer: &SimTimer, line: &SimLine, flag: &TickFlag) -> bool {
    if !timer.take_irq() || !line.is_enabled() {
        return false;
    }
    line.raise();
    let _ = tick::on_interrupt(
        &mut timer.clone(),
        &mut line.clone(),
        flag,
        Timeout::Spins(100),
    );
    true
}

/// Idles by letting the simulated clock run for `clocks_per_wait` cycles, then taking any raised
/// timer interrupt. With `spurious_wakeups`, every other wait returns at once, as if another
/// interrupt had woken the core.
pub struct SimIdle {
    pub timer: SimTimer,
    pub line: SimLine,
    pub flag: &'static TickFlag,
    pub clocks_per_wait: u64,
    pub spurious_wakeups: bool,
    pub wakes: u32,
    pub interrupts: u32,
}

impl SimIdle {
    pub fn new(timer: SimTimer, line: SimLine, flag: &'static TickFlag, clocks_per_wait: u64) -> Self {
        Self {
            timer,
            line,
            flag,
            clocks_per_wait,
            spurious_wakeups: false,
            wakes: 0,
            interrupts: 0,
        }
    }
}

impl Idle for SimIdle {
    fn wait(&mut self) {
        self.wakes += 1;
        if self.spurious_wakeups && self.wakes % 2 == 0 {
            return;
        }
        self.timer.advance(self.clocks_per_wait);
        if deliver_interrupt(&self.timer, &self.line, self.flag) {
            self.interrupts += 1;
        }
    }
}

pub fn leak_flag() -> &'static TickFlag {
    Box::leak(Box::new(TickFlag::new()))
}
