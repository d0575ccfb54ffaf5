// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! SPI / OPI flash controller.
//!
//! Every call to [`SpiOpi::tick`] is one rising edge of `sys`. The tick
//! first computes the outputs of the current state, then the next state of
//! every block from the same snapshot, and commits them together: no block
//! observes another block's update of the same tick.
//!
//! Usage
//! -----
//!
//! ```rust
//! use spiopi::{BusRequest, Config, PadInputs, SpiOpi};
//!
//! let mut ctrl = SpiOpi::new(Config::new());
//! let out = ctrl.tick(&PadInputs::idle(), &BusRequest::idle());
//! assert!(out.pads.cs_n);
//! ```

use log::{trace, warn};
use tock_registers::interfaces::Readable;

use crate::bus::{BusRequest, BusResponse};
use crate::config::Config;
use crate::delay::DelayLine;
use crate::ecc::{ErrorAck, ErrorMonitor};
use crate::event_manager::EventManager;
use crate::mac::{Mac, MacInputs, MacState};
use crate::mux::{self, PadInputs, PadOutputs};
use crate::opi_phy::OpiPhy;
use crate::registers::{SpiOpiRegisters, StatusUpdate, CONFIG, ECC_ERROR_EVENT};
use crate::spi_phy::SpiPhy;

/// Outputs of the controller for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Outputs {
    pub pads: PadOutputs,
    pub bus: BusResponse,
    /// Event manager interrupt line
    pub irq: bool,
}

pub struct SpiOpi {
    registers: SpiOpiRegisters,
    mac: Mac,
    spi: SpiPhy,
    opi: OpiPhy,
    dqs_delay: DelayLine,
    dq_delay: DelayLine,
    ecc: ErrorMonitor,
    events: EventManager,
}

impl SpiOpi {
    pub fn new(config: Config) -> SpiOpi {
        SpiOpi {
            registers: SpiOpiRegisters::new(&config),
            mac: Mac::new(config),
            spi: SpiPhy::new(),
            opi: OpiPhy::new(),
            dqs_delay: DelayLine::new(config.dqs_delay_taps, config.delay_type),
            dq_delay: DelayLine::new(config.dq_delay_taps, config.delay_type),
            ecc: ErrorMonitor::new(),
            events: EventManager::new(1 << ECC_ERROR_EVENT),
        }
    }

    /// CSR bank. Accesses between two ticks take effect with the next
    /// tick.
    pub fn registers(&self) -> &SpiOpiRegisters {
        &self.registers
    }

    pub fn mac(&self) -> &Mac {
        &self.mac
    }

    pub fn spi_phy(&self) -> &SpiPhy {
        &self.spi
    }

    pub fn opi_phy(&self) -> &OpiPhy {
        &self.opi
    }

    pub fn error_monitor(&self) -> &ErrorMonitor {
        &self.ecc
    }

    /// Outputs of the current state.
    pub fn outputs(&self) -> Outputs {
        Outputs {
            pads: mux::drive(self.mac.protocol(), self.mac.cs_n(), &self.spi, &self.opi),
            bus: BusResponse {
                ack: self.mac.bus_ack(),
                err: self.mac.bus_err(),
                dat_r: self.mac.dat_r(),
            },
            irq: self.events.irq(self.registers.ev_enable.get()),
        }
    }

    /// Advance by one tick. Returns the outputs driven during this tick.
    pub fn tick(&mut self, pads: &PadInputs, bus: &BusRequest) -> Outputs {
        let outputs = self.outputs();
        let strobes = self.registers.take_strobes();
        let config = self.registers.config.extract();
        let dummy_cycles = config.read(CONFIG::DUMMY) as u8;
        let (miso, word) = mux::sample(pads);

        let (mac, effects) = self.mac.next(&MacInputs {
            bus,
            command: self.registers.command.extract(),
            opi_mode: config.is_set(CONFIG::OPI_MODE),
            spi_ack: self.spi.ack(),
            spi_di: self.spi.di(),
        });
        let spi = self
            .spi
            .next(self.mac.spi_request(), miso, dummy_cycles);
        let opi = self
            .opi
            .next(self.mac.opi_request(), word, dummy_cycles);
        let dqs_delay = self.dqs_delay.next(
            self.registers.dqs_delay_config.extract(),
            strobes.dqs_delay_config,
        );
        let dq_delay = self
            .dq_delay
            .next(self.registers.delay_config.extract(), strobes.delay_config);
        let ecc = self.ecc.next(
            pads.ecs_n,
            self.mac.cache().address,
            ErrorAck {
                status: strobes.ecc_status,
                address: strobes.ecc_address,
            },
        );
        let falling = u32::from(self.ecc.falling_edge()) << ECC_ERROR_EVENT;
        let events = self.events.next(
            u32::from(self.ecc.live()) << ECC_ERROR_EVENT,
            falling,
            strobes.ev_clear,
        );

        if mac.state() != self.mac.state() {
            trace!("mac: {:?} -> {:?}", self.mac.state(), mac.state());
        }
        if self.ecc.falling_edge() {
            warn!(
                "ECC event at {:#010x}{}",
                self.mac.cache().address,
                if self.ecc.pending() { " (overflow)" } else { "" }
            );
        }

        self.mac = mac;
        self.spi = spi;
        self.opi = opi;
        self.dqs_delay = dqs_delay;
        self.dq_delay = dq_delay;
        self.ecc = ecc;
        self.events = events;

        self.registers.commit(
            &strobes,
            &StatusUpdate {
                dqs_taps: dqs_delay.taps(),
                dq_taps: dq_delay.taps(),
                id: effects.id,
                clear_command: effects.clear_command,
                unsupported: effects.unsupported,
                idle: mac.state() == MacState::Idle,
                ecc_address: ecc.address(),
                ecc_live: ecc.live(),
                ecc_overflow: ecc.overflow(),
                ev_status: events.status(),
                ev_pending: events.pending(),
            },
        );
        outputs
    }
}
