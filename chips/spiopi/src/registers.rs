// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Configuration and status register bank.
//!
//! The bank mirrors the LiteX CSRs of the controller. Storage registers
//! (written by software) are plain [`InMemoryRegister`]s; status registers
//! are refreshed by the controller at the end of every tick.
//!
//! Some accesses have side effects which are only observed by the next
//! tick, exactly like the `re` / `we` strobes of a LiteX CSR:
//!
//! - writing `dqs_delay_config` or `delay_config` produces the one-cycle
//!   `ce` pulse (the `ce` bit always reads back as zero afterwards),
//! - reading or writing `ecc_status` acknowledges a pending error event,
//! - reading `ecc_address` clears the pending flag of the error event,
//! - writing `ev_pending` clears the written event bits,
//! - reading `mac_status` clears the sticky `unsupported` flag.

use core::cell::Cell;

use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::register_bitfields;
use tock_registers::registers::InMemoryRegister;

use crate::config::Config;
use crate::errorcode::ErrorCode;

register_bitfields![u32,
    pub CONFIG [
        /// Select the OPI PHY. CR2 must be set up before enabling this bit.
        OPI_MODE OFFSET(0) NUMBITS(1) [],
        /// Number of dummy cycles
        DUMMY OFFSET(1) NUMBITS(5) []
    ],
    pub DELAY_CONFIG [
        /// Delay amount; each increment is 78ps
        D OFFSET(0) NUMBITS(5) [],
        /// Set delay taps to `D`
        LOAD OFFSET(5) NUMBITS(1) [],
        /// `1` increments delay, `0` decrements delay when `CE` is pulsed
        INC OFFSET(6) NUMBITS(1) [],
        /// Writing `1` steps the delay according to `INC`
        CE OFFSET(7) NUMBITS(1) []
    ],
    pub DELAY_STATUS [
        /// Readback of current delay amount
        Q OFFSET(0) NUMBITS(5) []
    ],
    pub COMMAND [
        /// Issue a RDID command and update the `id` register
        RDID OFFSET(0) NUMBITS(1) [],
        /// Write configuration register 2 with `cr2_00`
        WRCR2_00 OFFSET(1) NUMBITS(1) [],
        /// Sequence through the init and wakeup routine
        WAKEUP OFFSET(2) NUMBITS(1) []
    ],
    pub ID [
        ID OFFSET(0) NUMBITS(24) []
    ],
    pub CR2_00 [
        /// STR OPI enable (not supported by this PHY)
        SOPI OFFSET(0) NUMBITS(1) [],
        /// DTR OPI enable
        DOPI OFFSET(1) NUMBITS(1) []
    ],
    pub ECC_STATUS [
        /// Live, synchronized level of ECS_N (error on current packet when low)
        ECC_ERROR OFFSET(0) NUMBITS(1) [],
        /// More than one error event since the last acknowledgment
        ECC_OVERFLOW OFFSET(1) NUMBITS(1) []
    ],
    pub EV [
        ECC_ERROR OFFSET(0) NUMBITS(1) []
    ],
    pub MAC_STATUS [
        /// An unimplemented command path was requested
        UNSUPPORTED OFFSET(0) NUMBITS(1) [],
        /// The sequencer is idle and accepts requests
        IDLE OFFSET(1) NUMBITS(1) []
    ]
];

/// Index of the ECC error source in the event manager registers.
pub const ECC_ERROR_EVENT: usize = 0;

/// CSR byte offsets.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(usize)]
pub enum Csr {
    Config = 0x00,
    DqsDelayConfig = 0x04,
    DqsDelayStatus = 0x08,
    DelayConfig = 0x0C,
    DelayStatus = 0x10,
    Command = 0x14,
    Id = 0x18,
    Cr2 = 0x1C,
    EccAddress = 0x20,
    EccStatus = 0x24,
    EvStatus = 0x28,
    EvPending = 0x2C,
    EvEnable = 0x30,
    MacStatus = 0x34,
}

impl TryFrom<usize> for Csr {
    type Error = ErrorCode;

    fn try_from(offset: usize) -> Result<Csr, ErrorCode> {
        match offset {
            0x00 => Ok(Csr::Config),
            0x04 => Ok(Csr::DqsDelayConfig),
            0x08 => Ok(Csr::DqsDelayStatus),
            0x0C => Ok(Csr::DelayConfig),
            0x10 => Ok(Csr::DelayStatus),
            0x14 => Ok(Csr::Command),
            0x18 => Ok(Csr::Id),
            0x1C => Ok(Csr::Cr2),
            0x20 => Ok(Csr::EccAddress),
            0x24 => Ok(Csr::EccStatus),
            0x28 => Ok(Csr::EvStatus),
            0x2C => Ok(Csr::EvPending),
            0x30 => Ok(Csr::EvEnable),
            0x34 => Ok(Csr::MacStatus),
            _ => Err(ErrorCode::INVAL),
        }
    }
}

/// Access strobes collected between two ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Strobes {
    pub dqs_delay_config: bool,
    pub delay_config: bool,
    pub ecc_status: bool,
    pub ecc_address: bool,
    pub ev_clear: u32,
}

/// Status values produced by one tick, written back to the bank.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct StatusUpdate {
    pub dqs_taps: u8,
    pub dq_taps: u8,
    pub id: Option<u32>,
    pub clear_command: bool,
    pub unsupported: bool,
    pub idle: bool,
    pub ecc_address: u32,
    pub ecc_live: bool,
    pub ecc_overflow: bool,
    pub ev_status: u32,
    pub ev_pending: u32,
}

pub struct SpiOpiRegisters {
    pub config: InMemoryRegister<u32, CONFIG::Register>,
    pub dqs_delay_config: InMemoryRegister<u32, DELAY_CONFIG::Register>,
    pub dqs_delay_status: InMemoryRegister<u32, DELAY_STATUS::Register>,
    pub delay_config: InMemoryRegister<u32, DELAY_CONFIG::Register>,
    pub delay_status: InMemoryRegister<u32, DELAY_STATUS::Register>,
    pub command: InMemoryRegister<u32, COMMAND::Register>,
    pub id: InMemoryRegister<u32, ID::Register>,
    pub cr2_00: InMemoryRegister<u32, CR2_00::Register>,
    /// Address of the most recent ECC event
    pub ecc_address: InMemoryRegister<u32>,
    pub ecc_status: InMemoryRegister<u32, ECC_STATUS::Register>,
    pub ev_status: InMemoryRegister<u32, EV::Register>,
    pub ev_pending: InMemoryRegister<u32, EV::Register>,
    pub ev_enable: InMemoryRegister<u32, EV::Register>,
    pub mac_status: InMemoryRegister<u32, MAC_STATUS::Register>,
    strobes: Cell<Strobes>,
}

impl SpiOpiRegisters {
    pub fn new(config: &Config) -> SpiOpiRegisters {
        let regs = SpiOpiRegisters {
            config: InMemoryRegister::new(0),
            dqs_delay_config: InMemoryRegister::new(0),
            dqs_delay_status: InMemoryRegister::new(0),
            delay_config: InMemoryRegister::new(0),
            delay_status: InMemoryRegister::new(0),
            command: InMemoryRegister::new(0),
            id: InMemoryRegister::new(0),
            cr2_00: InMemoryRegister::new(0),
            ecc_address: InMemoryRegister::new(0),
            ecc_status: InMemoryRegister::new(0),
            ev_status: InMemoryRegister::new(0),
            ev_pending: InMemoryRegister::new(0),
            ev_enable: InMemoryRegister::new(0),
            mac_status: InMemoryRegister::new(0),
            strobes: Cell::new(Strobes::default()),
        };
        regs.config
            .write(CONFIG::DUMMY.val(u32::from(config.dummy_cycles & 0x1f)));
        regs.dqs_delay_status
            .write(DELAY_STATUS::Q.val(u32::from(config.dqs_delay_taps & 0x1f)));
        regs.delay_status
            .write(DELAY_STATUS::Q.val(u32::from(config.dq_delay_taps & 0x1f)));
        // ECS_N idles high
        regs.ecc_status.write(ECC_STATUS::ECC_ERROR::SET);
        regs.ev_status.write(EV::ECC_ERROR::SET);
        regs
    }

    /// Read a CSR, applying the read side effects of that register.
    pub fn read(&self, offset: usize) -> Result<u32, ErrorCode> {
        let csr = Csr::try_from(offset)?;
        let value = match csr {
            Csr::Config => self.config.get(),
            Csr::DqsDelayConfig => self.dqs_delay_config.get(),
            Csr::DqsDelayStatus => self.dqs_delay_status.get(),
            Csr::DelayConfig => self.delay_config.get(),
            Csr::DelayStatus => self.delay_status.get(),
            Csr::Command => self.command.get(),
            Csr::Id => self.id.get(),
            Csr::Cr2 => self.cr2_00.get(),
            Csr::EccAddress => {
                self.update_strobes(|s| s.ecc_address = true);
                self.ecc_address.get()
            }
            Csr::EccStatus => {
                self.update_strobes(|s| s.ecc_status = true);
                self.ecc_status.get()
            }
            Csr::EvStatus => self.ev_status.get(),
            Csr::EvPending => self.ev_pending.get(),
            Csr::EvEnable => self.ev_enable.get(),
            Csr::MacStatus => {
                let value = self.mac_status.get();
                self.mac_status.modify(MAC_STATUS::UNSUPPORTED::CLEAR);
                value
            }
        };
        Ok(value)
    }

    /// Write a CSR.
    ///
    /// Writes to status registers return `NOSUPPORT`, with the exception of
    /// `ecc_status`, where any write acknowledges the error event.
    pub fn write(&self, offset: usize, value: u32) -> Result<(), ErrorCode> {
        match Csr::try_from(offset)? {
            Csr::Config => self.config.set(value & 0x3f),
            Csr::DqsDelayConfig => {
                self.dqs_delay_config.set(value & 0xff);
                self.update_strobes(|s| s.dqs_delay_config = true);
            }
            Csr::DelayConfig => {
                self.delay_config.set(value & 0xff);
                self.update_strobes(|s| s.delay_config = true);
            }
            Csr::Command => self.command.set(value & 0x7),
            Csr::Cr2 => self.cr2_00.set(value & 0x3),
            Csr::EccStatus => self.update_strobes(|s| s.ecc_status = true),
            Csr::EvPending => self.update_strobes(|s| s.ev_clear |= value),
            Csr::EvEnable => self.ev_enable.set(value & 0x1),
            Csr::DqsDelayStatus
            | Csr::DelayStatus
            | Csr::Id
            | Csr::EccAddress
            | Csr::EvStatus
            | Csr::MacStatus => return Err(ErrorCode::NOSUPPORT),
        }
        Ok(())
    }

    fn update_strobes<F: FnOnce(&mut Strobes)>(&self, f: F) {
        let mut strobes = self.strobes.get();
        f(&mut strobes);
        self.strobes.set(strobes);
    }

    /// Hand the collected strobes to a tick. Every strobe is seen by
    /// exactly one tick.
    pub(crate) fn take_strobes(&self) -> Strobes {
        self.strobes.replace(Strobes::default())
    }

    pub(crate) fn commit(&self, strobes: &Strobes, update: &StatusUpdate) {
        // `ce` is a pulse field
        if strobes.dqs_delay_config {
            self.dqs_delay_config.modify(DELAY_CONFIG::CE::CLEAR);
        }
        if strobes.delay_config {
            self.delay_config.modify(DELAY_CONFIG::CE::CLEAR);
        }
        self.dqs_delay_status
            .write(DELAY_STATUS::Q.val(u32::from(update.dqs_taps)));
        self.delay_status
            .write(DELAY_STATUS::Q.val(u32::from(update.dq_taps)));

        if update.clear_command {
            self.command.set(0);
        }
        if let Some(id) = update.id {
            self.id.write(ID::ID.val(id & 0xff_ffff));
        }
        if update.unsupported {
            self.mac_status.modify(MAC_STATUS::UNSUPPORTED::SET);
        }
        self.mac_status
            .modify(MAC_STATUS::IDLE.val(u32::from(update.idle)));

        self.ecc_address.set(update.ecc_address);
        self.ecc_status.write(
            ECC_STATUS::ECC_ERROR.val(u32::from(update.ecc_live))
                + ECC_STATUS::ECC_OVERFLOW.val(u32::from(update.ecc_overflow)),
        );
        self.ev_status.set(update.ev_status);
        self.ev_pending.set(update.ev_pending);
    }
}
