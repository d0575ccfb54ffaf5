// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Test bench: the controller wired to a flash model and driven by a
//! simple bus master.
//!
//! Bus and CSR accesses are blocking: they tick the bench until the
//! controller answers, and fail with `BUSY` if it does not answer within
//! [`TIMEOUT_TICKS`].

use log::debug;
use spiopi::mac::MacState;
use spiopi::registers::{Csr, COMMAND};
use spiopi::{BusRequest, Config, ErrorCode, Outputs, PadOutputs, SpiOpi};
use tock_registers::fields::FieldValue;
use tock_registers::interfaces::Readable;

use crate::flash::FlashModel;

pub const TIMEOUT_TICKS: usize = 10_000;

pub struct Bench<'a> {
    ctrl: SpiOpi,
    flash: FlashModel<'a>,
    ticks: u64,
    trace: Option<Vec<PadOutputs>>,
}

impl<'a> Bench<'a> {
    pub fn new(config: Config, flash: FlashModel<'a>) -> Bench<'a> {
        Bench {
            ctrl: SpiOpi::new(config),
            flash,
            ticks: 0,
            trace: None,
        }
    }

    pub fn controller(&self) -> &SpiOpi {
        &self.ctrl
    }

    pub fn flash(&self) -> &FlashModel<'a> {
        &self.flash
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Start recording the pad outputs of every tick.
    pub fn record(&mut self) {
        self.trace = Some(Vec::new());
    }

    /// Pads recorded since [`Bench::record`].
    pub fn trace(&self) -> &[PadOutputs] {
        match &self.trace {
            Some(trace) => trace,
            None => &[],
        }
    }

    /// Advance by one tick with `bus` driven by the master.
    pub fn step(&mut self, bus: &BusRequest) -> Outputs {
        let inputs = self.flash.pads();
        let outputs = self.ctrl.tick(&inputs, bus);
        self.flash.tick(&outputs.pads);
        if let Some(trace) = &mut self.trace {
            trace.push(outputs.pads);
        }
        self.ticks += 1;
        outputs
    }

    pub fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.step(&BusRequest::idle());
        }
    }

    /// Tick at least once, until the sequencer is idle with no command
    /// pending.
    pub fn run_until_idle(&mut self) -> Result<(), ErrorCode> {
        for _ in 0..TIMEOUT_TICKS {
            self.step(&BusRequest::idle());
            if self.ctrl.mac().state() == MacState::Idle
                && self.ctrl.registers().command.get() == 0
            {
                return Ok(());
            }
        }
        Err(ErrorCode::BUSY)
    }

    /// Hold `bus` until the controller answers. The request is released
    /// in the tick after the answer unless `keep` is set.
    fn transfer(&mut self, bus: &BusRequest, keep: bool) -> Result<u32, ErrorCode> {
        for _ in 0..TIMEOUT_TICKS {
            let outputs = self.step(bus);
            if outputs.bus.ack || outputs.bus.err {
                if !keep {
                    self.step(&BusRequest::idle());
                }
                return if outputs.bus.err {
                    Err(ErrorCode::FAIL)
                } else {
                    Ok(outputs.bus.dat_r)
                };
            }
        }
        Err(ErrorCode::BUSY)
    }

    /// Single read of bus word `adr`.
    pub fn read_word(&mut self, adr: u32) -> Result<u32, ErrorCode> {
        self.transfer(&BusRequest::read(adr), false)
    }

    /// Incrementing burst starting at bus word `adr`. Each beat is issued
    /// in the tick following the previous acknowledgement.
    pub fn read_burst(&mut self, adr: u32, buf: &mut [u32]) -> Result<(), ErrorCode> {
        let count = buf.len();
        for (i, word) in buf.iter_mut().enumerate() {
            let last = i + 1 == count;
            *word = self.transfer(&BusRequest::burst(adr.wrapping_add(i as u32)), !last)?;
        }
        Ok(())
    }

    pub fn write_word(&mut self, adr: u32) -> Result<(), ErrorCode> {
        self.transfer(&BusRequest::write(adr), false).map(|_| ())
    }

    /// Register read through the CSR bus; side effects apply in the tick
    /// of the access.
    pub fn csr_read(&mut self, csr: Csr) -> Result<u32, ErrorCode> {
        let value = self.ctrl.registers().read(csr as usize)?;
        self.step(&BusRequest::idle());
        Ok(value)
    }

    pub fn csr_write(&mut self, csr: Csr, value: u32) -> Result<(), ErrorCode> {
        self.ctrl.registers().write(csr as usize, value)?;
        self.step(&BusRequest::idle());
        Ok(())
    }

    /// Issue a special command and wait for it to complete.
    pub fn command(&mut self, command: FieldValue<u32, COMMAND::Register>) -> Result<(), ErrorCode> {
        debug!("command {:#x}", command.value);
        self.csr_write(Csr::Command, command.value)?;
        self.run_until_idle()
    }

    pub fn read_id(&mut self) -> Result<u32, ErrorCode> {
        self.command(COMMAND::RDID::SET)?;
        self.csr_read(Csr::Id)
    }
}
