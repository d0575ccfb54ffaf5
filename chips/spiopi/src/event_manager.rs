// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! LiteX Event Manager
//!
//! Both sides of a LiteX event manager: the device logic updating the
//! `ev_status` / `ev_pending` registers every tick, and [`EventRegisters`],
//! the view software uses to enable, inspect and clear events.
//!
//! Every source of this controller is an "EventSourceProcess": it becomes
//! pending on a falling edge of its input and stays pending until cleared
//! by writing `1` to its bit of `ev_pending`. An edge in the same tick as
//! a clear wins.

use tock_registers::interfaces::Readable;

use crate::errorcode::ErrorCode;
use crate::registers::{Csr, SpiOpiRegisters};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventManager {
    status: u32,
    pending: u32,
}

impl EventManager {
    pub const fn new(status: u32) -> EventManager {
        EventManager { status, pending: 0 }
    }

    /// Current input levels of all sources.
    pub fn status(&self) -> u32 {
        self.status
    }

    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// The CPU interrupt is asserted while any enabled source is pending.
    pub fn irq(&self, enable: u32) -> bool {
        self.pending & enable != 0
    }

    /// `inputs` are the source levels, `falling` the sources with a
    /// falling edge this tick and `clear` the bits written to `ev_pending`.
    pub fn next(&self, inputs: u32, falling: u32, clear: u32) -> EventManager {
        EventManager {
            status: inputs,
            pending: (self.pending & !clear) | falling,
        }
    }
}

/// Software view of the event manager registers.
///
/// Events are addressed by their index in the event manager's registers
/// (starting at 0).
pub struct EventRegisters<'a> {
    regs: &'a SpiOpiRegisters,
}

/// Register bit of event `index`; `INVAL` past the register width.
fn event_bit(index: usize) -> Result<u32, ErrorCode> {
    u32::try_from(index)
        .ok()
        .and_then(|index| 1u32.checked_shl(index))
        .ok_or(ErrorCode::INVAL)
}

impl<'a> EventRegisters<'a> {
    pub const fn new(regs: &'a SpiOpiRegisters) -> EventRegisters<'a> {
        EventRegisters { regs }
    }

    pub fn disable_all(&self) -> Result<(), ErrorCode> {
        self.regs.write(Csr::EvEnable as usize, 0)
    }

    pub fn enable_event(&self, index: usize) -> Result<(), ErrorCode> {
        let bit = event_bit(index)?;
        let enabled = self.regs.ev_enable.get();
        self.regs.write(Csr::EvEnable as usize, enabled | bit)
    }

    pub fn disable_event(&self, index: usize) -> Result<(), ErrorCode> {
        let bit = event_bit(index)?;
        let enabled = self.regs.ev_enable.get();
        self.regs.write(Csr::EvEnable as usize, enabled & !bit)
    }

    pub fn event_enabled(&self, index: usize) -> bool {
        event_bit(index).is_ok_and(|bit| self.regs.ev_enable.get() & bit != 0)
    }

    /// Whether the input of an event source is currently high,
    /// independent of whether the event is enabled or pending.
    pub fn event_source_input(&self, index: usize) -> bool {
        event_bit(index).is_ok_and(|bit| self.regs.ev_status.get() & bit != 0)
    }

    pub fn event_pending(&self, index: usize) -> bool {
        event_bit(index).is_ok_and(|bit| self.regs.ev_pending.get() & bit != 0)
    }

    /// Both enabled and pending.
    pub fn event_asserted(&self, index: usize) -> bool {
        self.event_enabled(index) && self.event_pending(index)
    }

    /// Get the lowest asserted event.
    pub fn next_asserted(&self) -> Option<usize> {
        let asserted = self.regs.ev_enable.get() & self.regs.ev_pending.get();
        match asserted.trailing_zeros() {
            32 => None,
            index => Some(index as usize),
        }
    }

    /// Takes effect with the next tick.
    pub fn clear_event(&self, index: usize) -> Result<(), ErrorCode> {
        self.regs.write(Csr::EvPending as usize, event_bit(index)?)
    }
}
