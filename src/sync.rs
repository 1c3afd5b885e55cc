// Copyright 2026 The samd21-retick authors.
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Waiting on hardware-reported conditions.
//!
//! Most ADC and TCC configuration registers live in a different clock domain from the CPU. After a
//! write, the peripheral raises a `SYNCBUSY` bit until the value has crossed over, and nothing else
//! may be written in the meantime. Every such wait in this crate goes through [`wait_while`], so a
//! single [`Timeout`] decides whether a stuck peripheral hangs the core or surfaces an error.

use core::hint::spin_loop;

/// How long to keep polling a hardware condition before giving up.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Poll forever. A peripheral that never reports completion hangs the caller.
    #[default]
    Unbounded,
    /// Poll at most this many times.
    Spins(u32),
}

/// The polled condition was still true when the [`Timeout`] ran out.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimedOut;

/// Spins until `busy` returns `false`, or the timeout runs out.
#[inline]
pub fn wait_while(timeout: Timeout, mut busy: impl FnMut() -> bool) -> Result<(), TimedOut> {
    match timeout {
        Timeout::Unbounded => {
            while busy() {
                spin_loop();
            }
            Ok(())
        }
        Timeout::Spins(budget) => {
            for _ in 0..budget {
                if !busy() {
                    return Ok(());
                }
                spin_loop();
            }
            // One last look, so that a zero budget still reports an already clear condition.
            if busy() { Err(TimedOut) } else { Ok(()) }
        }
    }
}
