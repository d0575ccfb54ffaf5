// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Bus bridge for the fixed-function fallback flash core.
//!
//! The fallback core is a simple read-only memory-mapped SPI core with a
//! `valid` / `ready` handshake and a 24-bit byte address. Only the bus
//! glue is modelled here; the core itself is supplied by the user through
//! [`FallbackCore`].
//!
//! The core's 32-bit configuration register is reached through four
//! byte-wide `cfg` storage registers and four `stat` status registers.
//! A write to `cfg<n>` strobes lane `n` of the core's write enable for one
//! tick; `stat<n>` shows lane `n` of the core's configuration output.

use crate::bus::{BusRequest, BusResponse};
use crate::errorcode::ErrorCode;

/// Default size of the flash window behind the fallback core.
pub const DEFAULT_SIZE: u32 = 2 * 1024 * 1024;

pub trait FallbackCore {
    /// Advance the core by one tick. `valid` is held while a read of the
    /// byte address `addr` is outstanding; the core returns the data word
    /// in the tick it is ready.
    fn tick(&mut self, valid: bool, addr: u32) -> Option<u32>;

    /// Configuration register port, clocked with [`FallbackCore::tick`].
    /// Bit `n` of `we` writes byte lane `n` of `di`; returns the current
    /// register value.
    fn cfgreg(&mut self, we: u8, di: u32) -> u32;
}

/// Number of byte-wide `cfg` / `stat` registers.
pub const CFG_REGISTERS: usize = 4;

pub struct SpiNorBridge<C: FallbackCore> {
    core: C,
    word_mask: u32,
    read_active: bool,
    ack: bool,
    err: bool,
    dat_r: u32,
    cfg: [u8; CFG_REGISTERS],
    cfg_we: u8,
    stat: [u8; CFG_REGISTERS],
}

impl<C: FallbackCore> SpiNorBridge<C> {
    /// `size` is the flash window in bytes and must be a power of two of
    /// at least one word, no larger than the 24-bit address space.
    pub fn new(core: C, size: u32) -> Result<SpiNorBridge<C>, ErrorCode> {
        if !size.is_power_of_two() || size < 4 {
            return Err(ErrorCode::INVAL);
        }
        if size > (1 << 24) {
            return Err(ErrorCode::SIZE);
        }
        Ok(SpiNorBridge {
            core,
            word_mask: size / 4 - 1,
            read_active: false,
            ack: false,
            err: false,
            dat_r: 0,
            cfg: [0; CFG_REGISTERS],
            cfg_we: 0,
            stat: [0; CFG_REGISTERS],
        })
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    /// Write `cfg<index>`. Reaches the core with the next tick.
    pub fn write_cfg(&mut self, index: usize, value: u8) -> Result<(), ErrorCode> {
        let slot = self.cfg.get_mut(index).ok_or(ErrorCode::INVAL)?;
        *slot = value;
        self.cfg_we |= 1 << index;
        Ok(())
    }

    pub fn cfg(&self, index: usize) -> Result<u8, ErrorCode> {
        self.cfg.get(index).copied().ok_or(ErrorCode::INVAL)
    }

    pub fn stat(&self, index: usize) -> Result<u8, ErrorCode> {
        self.stat.get(index).copied().ok_or(ErrorCode::INVAL)
    }

    /// Byte address presented to the core for bus word `adr`.
    pub fn flash_addr(&self, adr: u32) -> u32 {
        ((adr & self.word_mask) << 2) & 0xFF_FFFF
    }

    pub fn tick(&mut self, bus: &BusRequest) -> BusResponse {
        let response = BusResponse {
            ack: self.ack,
            err: self.err,
            dat_r: self.dat_r,
        };

        let answered = self.ack || self.err;
        let valid = bus.active() && !bus.we && !answered;
        let ready = self.core.tick(valid, self.flash_addr(bus.adr));
        let cfg_out = self.core.cfgreg(self.cfg_we, u32::from_le_bytes(self.cfg));
        self.cfg_we = 0;
        self.stat = cfg_out.to_le_bytes();

        self.ack = false;
        self.err = bus.active() && bus.we && !answered;
        if valid && !self.read_active {
            self.read_active = true;
        } else {
            if self.read_active {
                if let Some(data) = ready {
                    self.dat_r = data;
                    self.ack = true;
                }
            }
            self.read_active = false;
        }
        response
    }
}
