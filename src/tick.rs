// Copyright 2026 The samd21-retick authors.
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Interrupt-driven tick scheduler
//!
//! A 24-bit timer/counter raises its counter interrupt once per requested period. The interrupt
//! handler only clears the interrupt and sets a [`TickFlag`]; the application callback runs in the
//! main context from [`TickScheduler::run`], which sleeps between interrupts.
//!
//! ```ignore
//! static TICK: TickFlag = TickFlag::new();
//!
//! #[interrupt]
//! fn TCC1() {
//!     let _ = tick::on_interrupt(&mut Tcc1::steal(), &mut Tcc1Interrupt, &TICK, Timeout::Unbounded);
//! }
//!
//! let scheduler = TickScheduler::new(p.tcc1, Tcc1Interrupt, &TICK, tick::Config::default());
//! scheduler.run(10, &mut Wfi, || {
//!     // every 10 ms
//!     None
//! });
//! ```

use core::convert::Infallible;

use portable_atomic::{AtomicBool, Ordering};

use crate::sync::{Timeout, wait_while};
use crate::time::{Hertz, U32Ext};

/// Largest value of the 24-bit counter.
pub const COUNTER_MAX: u32 = 0x00ff_ffff;

/// Largest prescaler shift, i.e. ÷1024.
pub const MAX_DIVIDER_SHIFT: u8 = 10;

const CTRLA_SWRST: u32 = 1 << 0;
const CTRLA_ENABLE: u32 = 1 << 1;
const CTRLA_PRESCALER_SHIFT: u32 = 8;
const CTRLA_PRESCALER_MASK: u32 = 0x7 << CTRLA_PRESCALER_SHIFT;
const SYNCBUSY_MASK: u32 = 0x007f_ffff;
const EVCTRL_CNTSEL_SHIFT: u32 = 6;
const EVCTRL_CNTSEL_MASK: u32 = 0x3 << EVCTRL_CNTSEL_SHIFT;
/// Counter event at the end of each counting cycle.
const EVCTRL_CNTSEL_END: u32 = 0x1 << EVCTRL_CNTSEL_SHIFT;
const INT_CNT: u32 = 1 << 2;

/// Timer/counter registers used by the scheduler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    CtrlA,
    SyncBusy,
    EvCtrl,
    IntEnSet,
    IntFlag,
    Count,
    Per,
}

/// Access to a timer/counter's registers.
pub trait TimerRegisters {
    fn read(&self, register: Register) -> u32;

    fn write(&mut self, register: Register, value: u32);

    fn modify(&mut self, register: Register, f: impl FnOnce(u32) -> u32) {
        let value = self.read(register);
        self.write(register, f(value));
    }

    /// Enables the timer's bus clock and routes a generic clock to it.
    fn enable_clock(&mut self);
}

/// The interrupt controller line the timer is wired to.
pub trait InterruptLine {
    /// Clears a pending request for this line.
    fn unpend(&mut self);

    /// Sets the priority (0 is the most urgent) and unmasks the line.
    fn enable(&mut self, priority: u8);
}

/// Low-power wait used between ticks.
pub trait Idle {
    /// Halts until any interrupt has been taken.
    fn wait(&mut self);
}

/// Tick scheduler error
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A register write did not synchronize in time.
    #[error("Timer register synchronization timed out")]
    SyncTimeout,
}

/// Pending-tick signal between the interrupt handler and the dispatch loop.
///
/// Set only by [`on_interrupt`], taken only by the dispatch loop.
#[derive(Debug, Default)]
pub struct TickFlag(AtomicBool);

impl TickFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Marks a tick as pending.
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns whether a tick was pending, clearing it.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::Acquire)
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Prescaler setting and counter top value for one tick period.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Period {
    /// The counter clock is divided by `1 << divider_shift`.
    pub divider_shift: u8,
    /// The counter counts from 0 to `top` inclusive.
    pub top: u32,
}

/// Finds the smallest divider for which the period fits the counter.
///
/// Periods too long for even the largest divider saturate to the longest representable interval.
pub fn compute_period(cycles_per_ms: u32, period_ms: u32) -> Period {
    let cycles = u64::from(cycles_per_ms) * u64::from(period_ms);
    (0..=MAX_DIVIDER_SHIFT)
        .find(|&shift| cycles >> shift < u64::from(COUNTER_MAX))
        .map_or(
            Period {
                divider_shift: MAX_DIVIDER_SHIFT,
                top: COUNTER_MAX,
            },
            |shift| Period {
                divider_shift: shift,
                top: (cycles >> shift) as u32,
            },
        )
}

/// Counter clock prescaler settings supported by the TCC.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div8 = 3,
    Div16 = 4,
    Div64 = 5,
    Div256 = 6,
    Div1024 = 7,
}

impl Prescaler {
    const ALL: [Prescaler; 8] = [
        Prescaler::Div1,
        Prescaler::Div2,
        Prescaler::Div4,
        Prescaler::Div8,
        Prescaler::Div16,
        Prescaler::Div64,
        Prescaler::Div256,
        Prescaler::Div1024,
    ];

    /// log2 of the division factor.
    pub const fn shift(self) -> u8 {
        match self {
            Prescaler::Div1 => 0,
            Prescaler::Div2 => 1,
            Prescaler::Div4 => 2,
            Prescaler::Div8 => 3,
            Prescaler::Div16 => 4,
            Prescaler::Div64 => 6,
            Prescaler::Div256 => 8,
            Prescaler::Div1024 => 10,
        }
    }

    /// The smallest supported prescaler dividing by at least `1 << shift`.
    pub fn at_least(shift: u8) -> Self {
        Self::ALL
            .into_iter()
            .find(|prescaler| prescaler.shift() >= shift)
            .unwrap_or(Prescaler::Div1024)
    }

    const fn bits(self) -> u32 {
        (self as u32) << CTRLA_PRESCALER_SHIFT
    }
}

/// The period actually programmed: [`compute_period`], with the divider rounded up to one the
/// prescaler supports and the top value recomputed for it.
pub fn hardware_period(cycles_per_ms: u32, period_ms: u32) -> (Prescaler, Period) {
    let period = compute_period(cycles_per_ms, period_ms);
    let prescaler = Prescaler::at_least(period.divider_shift);
    if prescaler.shift() == period.divider_shift {
        return (prescaler, period);
    }
    let cycles = u64::from(cycles_per_ms) * u64::from(period_ms);
    (
        prescaler,
        Period {
            divider_shift: prescaler.shift(),
            top: (cycles >> prescaler.shift()) as u32,
        },
    )
}

/// Tick scheduler configuration
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Frequency of the generic clock feeding the timer.
    pub core_clock: Hertz,
    /// Interrupt priority, 0 (most urgent) to 3.
    pub priority: u8,
    pub timeout: Timeout,
}

impl Config {
    pub fn core_clock(mut self, core_clock: Hertz) -> Self {
        self.core_clock = core_clock;
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core_clock: 48.mhz(),
            priority: 3,
            timeout: Timeout::Unbounded,
        }
    }
}

/// What the scheduler has programmed into the timer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickTimerState {
    /// Last requested period.
    pub period_ms: u32,
    pub divider_shift: u8,
    pub top: u32,
    /// The one-time timer and interrupt setup has been done.
    pub armed: bool,
    /// Set by [`TickScheduler::start`]; the scheduler is dispatching ticks.
    pub started: bool,
}

/// Periodic tick scheduler, owning the timer and its interrupt line.
pub struct TickScheduler<T, I> {
    timer: T,
    line: I,
    flag: &'static TickFlag,
    config: Config,
    state: TickTimerState,
}

impl<T: TimerRegisters, I: InterruptLine> TickScheduler<T, I> {
    /// Creates an unconfigured scheduler. The hardware is not touched until the first
    /// [`arm`](Self::arm).
    ///
    /// `flag` must be the same flag the interrupt handler passes to [`on_interrupt`].
    pub fn new(timer: T, line: I, flag: &'static TickFlag, config: Config) -> Self {
        Self {
            timer,
            line,
            flag,
            config,
            state: TickTimerState::default(),
        }
    }

    pub fn state(&self) -> &TickTimerState {
        &self.state
    }

    pub fn release(self) -> (T, I) {
        (self.timer, self.line)
    }

    /// Stops the timer, reprograms it for `period_ms` and starts it again.
    ///
    /// The first call also resets the timer and enables its interrupt. A tick that was pending from
    /// the previous period is discarded.
    pub fn arm(&mut self, period_ms: u32) -> Result<Period, Error> {
        if !self.state.armed {
            self.setup()?;
            self.state.armed = true;
        }
        self.stop()?;

        let (prescaler, period) = hardware_period(
            self.config.core_clock.cycles_per_millisecond(),
            period_ms,
        );

        self.timer.modify(Register::CtrlA, |v| {
            (v & !CTRLA_PRESCALER_MASK) | prescaler.bits()
        });
        self.wait_sync()?;
        self.timer.write(Register::Per, period.top);
        self.wait_sync()?;
        self.timer.write(Register::Count, 0);
        self.wait_sync()?;
        self.timer.modify(Register::CtrlA, |v| v | CTRLA_ENABLE);
        self.wait_sync()?;

        self.state.period_ms = period_ms;
        self.state.divider_shift = period.divider_shift;
        self.state.top = period.top;
        debug!(
            "tick armed: {} ms, divider shift {}, top {}",
            period_ms, period.divider_shift, period.top
        );
        Ok(period)
    }

    /// Runs `on_tick` if a tick is pending. Returns whether it ran.
    ///
    /// If `on_tick` returns a new period, the timer is re-armed with it before returning.
    pub fn dispatch(&mut self, on_tick: &mut impl FnMut() -> Option<u32>) -> Result<bool, Error> {
        if !self.flag.take() {
            return Ok(false);
        }
        if let Some(period_ms) = on_tick() {
            self.arm(period_ms)?;
        }
        Ok(true)
    }

    /// Arms the timer for `period_ms` and marks the scheduler as dispatching.
    ///
    /// [`run`](Self::run) starts with this; a custom main loop can call it and then
    /// [`dispatch`](Self::dispatch) after each wake-up.
    pub fn start(&mut self, period_ms: u32) -> Result<Period, Error> {
        let period = self.arm(period_ms)?;
        self.state.started = true;
        Ok(period)
    }

    /// Arms the timer for `period_ms` and dispatches ticks forever, sleeping in between.
    ///
    /// Any interrupt wakes the core, so the pending flag is checked after every wake-up. Only
    /// returns if the timer stops synchronizing.
    pub fn run(
        mut self,
        period_ms: u32,
        idle: &mut impl Idle,
        mut on_tick: impl FnMut() -> Option<u32>,
    ) -> Result<Infallible, Error> {
        self.start(period_ms)?;
        loop {
            idle.wait();
            self.dispatch(&mut on_tick)?;
        }
    }

    fn setup(&mut self) -> Result<(), Error> {
        self.timer.enable_clock();

        self.wait_sync()?;
        self.timer.modify(Register::CtrlA, |v| v & !CTRLA_ENABLE);
        self.wait_sync()?;
        self.timer.modify(Register::CtrlA, |v| v | CTRLA_SWRST);
        self.wait_sync()?;

        self.timer.modify(Register::CtrlA, |v| {
            (v & !CTRLA_PRESCALER_MASK) | Prescaler::Div1024.bits()
        });
        self.wait_sync()?;
        self.timer.modify(Register::EvCtrl, |v| {
            (v & !EVCTRL_CNTSEL_MASK) | EVCTRL_CNTSEL_END
        });
        self.wait_sync()?;
        self.timer.write(Register::IntEnSet, INT_CNT);
        self.wait_sync()?;

        self.line.unpend();
        self.line.enable(self.config.priority);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.timer.modify(Register::CtrlA, |v| v & !CTRLA_ENABLE);
        self.wait_sync()?;
        self.timer.write(Register::IntFlag, INT_CNT);
        self.wait_sync()?;
        self.line.unpend();
        self.flag.clear();
        Ok(())
    }

    fn wait_sync(&self) -> Result<(), Error> {
        sync_timer(&self.timer, self.config.timeout)
    }
}

fn sync_timer<T: TimerRegisters>(timer: &T, timeout: Timeout) -> Result<(), Error> {
    wait_while(timeout, || timer.read(Register::SyncBusy) & SYNCBUSY_MASK != 0)
        .map_err(|_| Error::SyncTimeout)
}

/// Body of the timer's interrupt handler.
///
/// Clears the interrupt at the controller and the counter flag at the timer, then signals `flag`.
/// The flag is signalled even if the flag write fails to synchronize.
pub fn on_interrupt<T: TimerRegisters, I: InterruptLine>(
    timer: &mut T,
    line: &mut I,
    flag: &TickFlag,
    timeout: Timeout,
) -> Result<(), Error> {
    line.unpend();
    timer.write(Register::IntFlag, INT_CNT);
    let synced = sync_timer(timer, timeout);
    flag.signal();
    synced
}
