// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Behavioral model of a Macronix octal flash in SPI mode.
//!
//! The model is driven by the controller's pad outputs one tick at a time.
//! Every tick with chip select low and the clock enabled is one SCLK
//! edge: MOSI is sampled and the next MISO bit is driven, visible to the
//! controller from the following tick.
//!
//! Supported commands:
//!
//! - `0xAB` release from deep power-down (the part powers up asleep),
//! - `0x9F` RDID,
//! - `0x0C` fast read with 4-byte address and 8 dummy clocks; data
//!   streams from the address with auto-increment until chip select
//!   rises.
//!
//! Bytes listed as "bad" pull ECS_N low for one tick when their first
//! bit is output.

use log::{debug, trace};
use spiopi::mac::{OPCODE_FAST_READ4, OPCODE_RDID, OPCODE_WAKEUP};
use spiopi::{PadInputs, PadOutputs};

/// Manufacturer, memory type and density of an MX66UM1G45G.
pub const MANUFACTURER_ID: [u8; 3] = [0xC2, 0x80, 0x3B];

const FAST_READ_DUMMY_CLOCKS: usize = 8;
/// First data clock of a fast read: opcode, 4 address bytes, dummy clocks
const FAST_READ_DATA_CLOCK: usize = 8 + 32 + FAST_READ_DUMMY_CLOCKS;

/// One chip-select low period.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transaction {
    /// Bytes received on MOSI, in order
    pub mosi: Vec<u8>,
    pub clocks: usize,
}

impl Transaction {
    pub fn opcode(&self) -> Option<u8> {
        self.mosi.first().copied()
    }
}

pub struct FlashModel<'a> {
    memory: &'a [u8],
    bad: &'a [u32],
    powered_down: bool,
    selected: bool,
    shift_in: u8,
    address: u32,
    current: Transaction,
    transactions: Vec<Transaction>,
    miso: bool,
    ecs_n: bool,
}

impl<'a> FlashModel<'a> {
    /// `memory` must not be empty; its length sets the address wrap.
    pub fn new(memory: &'a [u8]) -> FlashModel<'a> {
        FlashModel {
            memory,
            bad: &[],
            powered_down: true,
            selected: false,
            shift_in: 0,
            address: 0,
            current: Transaction::default(),
            transactions: Vec::new(),
            miso: false,
            ecs_n: true,
        }
    }

    /// Byte addresses reported as corrected through ECS_N.
    pub fn with_bad_bytes(mut self, bad: &'a [u32]) -> FlashModel<'a> {
        self.bad = bad;
        self
    }

    pub fn powered_down(&self) -> bool {
        self.powered_down
    }

    /// Completed transactions, oldest first.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The transaction in progress while chip select is low.
    pub fn active(&self) -> Option<&Transaction> {
        if self.selected {
            Some(&self.current)
        } else {
            None
        }
    }

    /// Levels seen by the controller in this tick. MISO is on lane 1.
    pub fn pads(&self) -> PadInputs {
        let lanes = if self.miso { 0x02 } else { 0x00 };
        PadInputs {
            dq_rise: lanes,
            dq_fall: lanes,
            ecs_n: self.ecs_n,
        }
    }

    fn byte_at(&self, address: u32) -> u8 {
        self.memory[address as usize % self.memory.len()]
    }

    fn end_transaction(&mut self) {
        if self.current.clocks > 0 {
            debug!(
                "flash: {:02x?} ({} clocks)",
                &self.current.mosi[..self.current.mosi.len().min(6)],
                self.current.clocks
            );
            self.transactions.push(core::mem::take(&mut self.current));
        }
        self.shift_in = 0;
        self.address = 0;
    }

    fn byte_received(&mut self, byte: u8) {
        let index = self.current.mosi.len();
        self.current.mosi.push(byte);
        match (self.current.opcode(), index) {
            (Some(OPCODE_WAKEUP), 0) => {
                trace!("flash: release from deep power-down");
                self.powered_down = false;
            }
            (Some(OPCODE_FAST_READ4), 1..=4) => {
                self.address = (self.address << 8) | u32::from(byte);
            }
            _ => {}
        }
    }

    /// Output bit for clock `clock` of the current transaction.
    fn output_bit(&mut self, clock: usize) -> bool {
        if self.powered_down {
            return false;
        }
        let bit = 7 - (clock % 8);
        match self.current.opcode() {
            Some(OPCODE_RDID) if (8..32).contains(&clock) => {
                (MANUFACTURER_ID[(clock - 8) / 8] >> bit) & 1 != 0
            }
            Some(OPCODE_FAST_READ4) if clock >= FAST_READ_DATA_CLOCK => {
                let offset = ((clock - FAST_READ_DATA_CLOCK) / 8) as u32;
                let address = self.address.wrapping_add(offset);
                if bit == 7 && self.bad.contains(&address) {
                    trace!("flash: corrected byte at {:#x}", address);
                    self.ecs_n = false;
                }
                (self.byte_at(address) >> bit) & 1 != 0
            }
            _ => false,
        }
    }

    pub fn tick(&mut self, pads: &PadOutputs) {
        self.ecs_n = true;
        if pads.cs_n {
            if self.selected {
                self.end_transaction();
            }
            self.selected = false;
            self.miso = false;
            return;
        }
        self.selected = true;
        if !pads.sclk_en {
            return;
        }

        let clock = self.current.clocks;
        let mosi = pads.dq_oe & 0x01 != 0 && pads.mosi();
        self.shift_in = (self.shift_in << 1) | u8::from(mosi);
        if clock % 8 == 7 {
            let byte = self.shift_in;
            self.byte_received(byte);
        }
        self.miso = self.output_bit(clock);
        self.current.clocks += 1;
    }
}
