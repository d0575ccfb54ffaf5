// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Bus-facing command sequencer (MAC).
//!
//! The MAC turns memory bus reads and the one-hot bits of the `command`
//! register into byte-level cycles for the PHY engines, and owns the chip
//! select. It is also responsible for the chip-select timing rules of the
//! flash: at least one clock-stopped tick between sequential reads, and at
//! least `cs_high_cycles` ticks of chip-select high around any other
//! operation.
//!
//! Reads use the 4-byte-address fast read (`0x0C`): opcode, four address
//! bytes (most significant first), one dummy byte, then four data bytes
//! per bus beat. The flash keeps streaming sequential data while chip
//! select stays low, so a read that continues where the previous one
//! ended only needs the four data bytes.
//!
//! OPI reads and the CR2 write are not implemented; requesting either is
//! reported through `mac_status.unsupported` and, for bus reads, an error
//! response, rather than stalling the bus.

use log::{debug, error};
use tock_registers::LocalRegisterCopy;

use crate::bus::{BusRequest, CycleType};
use crate::config::Config;
use crate::mux::ProtocolMode;
use crate::opi_phy::OpiCycleRequest;
use crate::registers::COMMAND;
use crate::spi_phy::SpiCycleRequest;

/// Release from deep power-down
pub const OPCODE_WAKEUP: u8 = 0xAB;
/// Read identification
pub const OPCODE_RDID: u8 = 0x9F;
/// Fast read with 4-byte address
pub const OPCODE_FAST_READ4: u8 = 0x0C;

/// Number of bytes clocked in after the RDID opcode.
const RDID_BYTES: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MacState {
    Reset,
    WakeupPre,
    WakeupCsWait,
    WakeupSend,
    WakeupAckWait,
    /// Chip select held high before returning to `Idle`
    CsHighHold,
    Idle,
    /// Data loop: one PHY cycle per remaining byte of the beat
    SpiRead,
    SpiReadData,
    SpiReadSetupCs,
    SpiReadOpcode,
    /// Queue address byte `n` (most significant first)
    SpiReadAddr(u8),
    SpiReadDummy,
    SpiReadDummyAck,
    RdidCsWait,
    RdidOpcode,
    RdidData,
    OpiRead,
    WriteCr2,
}

/// Byte address of the data the flash will return next, if chip select
/// is still low in a sequential read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BurstAddressCache {
    pub address: u32,
    pub valid: bool,
}

impl BurstAddressCache {
    pub const fn invalid() -> BurstAddressCache {
        BurstAddressCache {
            address: 0,
            valid: false,
        }
    }

    /// The cached address is at the start of bus word `adr`.
    pub fn hits(&self, adr: u32) -> bool {
        self.valid && (self.address >> 2) == (adr & 0x3FFF_FFFF)
    }

    fn advance(&self) -> BurstAddressCache {
        BurstAddressCache {
            address: self.address.wrapping_add(1),
            valid: self.valid,
        }
    }
}

/// Inputs sampled by the MAC in one tick.
#[derive(Clone, Copy)]
pub struct MacInputs<'a> {
    pub bus: &'a BusRequest,
    pub command: LocalRegisterCopy<u32, COMMAND::Register>,
    pub opi_mode: bool,
    pub spi_ack: bool,
    pub spi_di: u8,
}

/// Register updates requested by the MAC in one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MacEffects {
    pub clear_command: bool,
    /// Completed RDID result
    pub id: Option<u32>,
    pub unsupported: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mac {
    config: Config,
    state: MacState,
    count: u8,
    cs_n: bool,
    protocol: ProtocolMode,
    addr_updated: bool,
    /// No bus cycle was active in the previous tick
    new_cycle: bool,
    cache: BurstAddressCache,
    d_to_wb: u32,
    spi: SpiCycleRequest,
    opi: OpiCycleRequest,
    bus_ack: bool,
    bus_err: bool,
    dat_r: u32,
    id: u32,
}

impl Mac {
    pub const fn new(config: Config) -> Mac {
        Mac {
            config,
            state: MacState::Reset,
            count: 0,
            cs_n: true,
            protocol: ProtocolMode::Spi,
            addr_updated: false,
            new_cycle: true,
            cache: BurstAddressCache::invalid(),
            d_to_wb: 0,
            spi: SpiCycleRequest::idle(),
            opi: OpiCycleRequest::idle(),
            bus_ack: false,
            bus_err: false,
            dat_r: 0,
            id: 0,
        }
    }

    pub fn state(&self) -> MacState {
        self.state
    }

    pub fn cs_n(&self) -> bool {
        self.cs_n
    }

    pub fn protocol(&self) -> ProtocolMode {
        self.protocol
    }

    pub fn cache(&self) -> BurstAddressCache {
        self.cache
    }

    pub fn spi_request(&self) -> &SpiCycleRequest {
        &self.spi
    }

    pub fn opi_request(&self) -> &OpiCycleRequest {
        &self.opi
    }

    pub fn bus_ack(&self) -> bool {
        self.bus_ack
    }

    pub fn bus_err(&self) -> bool {
        self.bus_err
    }

    pub fn dat_r(&self) -> u32 {
        self.dat_r
    }

    /// Address byte `n` of the cached address, most significant first.
    fn address_byte(&self, n: u8) -> u8 {
        let byte = (self.cache.address >> (24 - 8 * u32::from(n))) as u8;
        if n == 0 {
            byte & self.config.address_mask_high
        } else {
            byte
        }
    }

    /// Raise chip select and wait before returning to `Idle`.
    fn hold_cs_high(&self, next: &mut Mac) {
        next.cs_n = true;
        next.count = self.config.cs_high_cycles;
        next.state = MacState::CsHighHold;
    }

    fn idle(&self, next: &mut Mac, input: &MacInputs, effects: &mut MacEffects) {
        let bus = input.bus;
        next.bus_ack = false;
        next.bus_err = false;
        next.protocol = if input.opi_mode {
            ProtocolMode::Opi
        } else {
            ProtocolMode::Spi
        };

        // the request seen while ack/err is out is the one just answered
        let answered = self.bus_ack || self.bus_err;
        let read = bus.active() && !bus.we && bus.cti != CycleType::EndOfBurst && !answered;

        if read {
            if self.protocol == ProtocolMode::Opi {
                next.state = MacState::OpiRead;
                return;
            }
            let continuation = bus.cti == CycleType::IncrementingBurst && !self.new_cycle;
            if self.cache.valid && (self.cache.hits(bus.adr) || continuation) {
                debug!("sequential read at {:#010x}", self.cache.address);
            } else {
                next.cache = BurstAddressCache {
                    address: bus.adr << 2,
                    valid: true,
                };
                next.addr_updated = true;
                next.cs_n = true;
                debug!("read at {:#010x}", bus.adr << 2);
            }
            next.count = 3;
            next.state = MacState::SpiRead;
        } else if bus.active() && bus.we && !answered {
            error!("write to read-only flash window at {:#010x}", bus.adr << 2);
            next.bus_err = true;
        } else if input.command.get() != 0 {
            effects.clear_command = true;
            next.cache = BurstAddressCache::invalid();
            next.cs_n = true;
            if self.protocol == ProtocolMode::Opi {
                error!("command {:#x} not supported in OPI mode", input.command.get());
                effects.unsupported = true;
            } else if input.command.is_set(COMMAND::WAKEUP) {
                debug!("wakeup");
                next.state = MacState::WakeupPre;
            } else if input.command.is_set(COMMAND::WRCR2_00) {
                next.state = MacState::WriteCr2;
            } else if input.command.is_set(COMMAND::RDID) {
                debug!("rdid");
                next.count = self.config.cs_high_cycles.saturating_sub(1);
                next.state = MacState::RdidCsWait;
            }
        }
    }

    pub fn next(&self, input: &MacInputs) -> (Mac, MacEffects) {
        let mut next = *self;
        let mut effects = MacEffects::default();
        next.new_cycle = !input.bus.active();

        match self.state {
            MacState::Reset => {
                next = Mac::new(self.config);
                next.state = MacState::WakeupPre;
            }
            MacState::WakeupPre => {
                next.cs_n = true;
                next.count = self.config.cs_high_cycles;
                next.state = MacState::WakeupCsWait;
            }
            MacState::WakeupCsWait => {
                next.count = self.count.wrapping_sub(1);
                if self.count == 0 {
                    next.cs_n = false;
                    next.count = self.config.wakeup_hold_cycles.saturating_sub(1);
                    next.state = MacState::WakeupSend;
                }
            }
            MacState::WakeupSend => {
                next.count = self.count.wrapping_sub(1);
                if self.count == 0 {
                    next.spi = SpiCycleRequest {
                        req: true,
                        data: OPCODE_WAKEUP,
                        has_dummy: false,
                    };
                    next.state = MacState::WakeupAckWait;
                }
            }
            MacState::WakeupAckWait => {
                next.spi.req = false;
                if input.spi_ack {
                    self.hold_cs_high(&mut next);
                }
            }
            MacState::CsHighHold => {
                next.count = self.count.wrapping_sub(1);
                if self.count == 0 {
                    next.state = MacState::Idle;
                }
            }
            MacState::Idle => self.idle(&mut next, input, &mut effects),
            MacState::SpiRead => {
                if self.addr_updated {
                    next.spi.has_dummy = false;
                    next.spi.req = false;
                    next.count = self.config.cs_high_cycles.saturating_sub(1);
                    next.cs_n = true;
                    next.state = MacState::SpiReadSetupCs;
                } else if self.count > 0 {
                    next.spi.has_dummy = false;
                    next.spi.req = true;
                    next.state = MacState::SpiReadData;
                } else {
                    next.spi.req = false;
                    if input.spi_ack {
                        next.dat_r = (self.d_to_wb >> 8) | (u32::from(input.spi_di) << 24);
                        next.bus_ack = true;
                        next.cache = self.cache.advance();
                        next.state = MacState::Idle;
                    }
                }
            }
            MacState::SpiReadData => {
                if input.spi_ack {
                    next.d_to_wb = (self.d_to_wb >> 8) | (u32::from(input.spi_di) << 24);
                    next.count = self.count - 1;
                    next.cache = self.cache.advance();
                    next.state = MacState::SpiRead;
                }
            }
            MacState::SpiReadSetupCs => {
                next.count = self.count.wrapping_sub(1);
                if self.count == 0 {
                    next.cs_n = false;
                    next.state = MacState::SpiReadOpcode;
                }
            }
            MacState::SpiReadOpcode => {
                next.spi = SpiCycleRequest {
                    req: true,
                    data: OPCODE_FAST_READ4,
                    has_dummy: false,
                };
                next.state = MacState::SpiReadAddr(0);
            }
            MacState::SpiReadAddr(n) => {
                // the ack seen here is for the byte queued by the previous state
                next.spi.data = self.address_byte(n);
                if input.spi_ack {
                    next.state = if n < 3 {
                        MacState::SpiReadAddr(n + 1)
                    } else {
                        MacState::SpiReadDummy
                    };
                }
            }
            MacState::SpiReadDummy => {
                next.spi.data = 0;
                if input.spi_ack {
                    next.state = MacState::SpiReadDummyAck;
                }
            }
            MacState::SpiReadDummyAck => {
                next.spi.req = false;
                next.addr_updated = false;
                if input.spi_ack {
                    next.count = 3;
                    next.state = MacState::SpiRead;
                }
            }
            MacState::RdidCsWait => {
                next.count = self.count.wrapping_sub(1);
                if self.count == 0 {
                    next.cs_n = false;
                    next.state = MacState::RdidOpcode;
                }
            }
            MacState::RdidOpcode => {
                next.spi = SpiCycleRequest {
                    req: true,
                    data: OPCODE_RDID,
                    has_dummy: false,
                };
                next.count = RDID_BYTES + 1;
                next.id = 0;
                next.state = MacState::RdidData;
            }
            MacState::RdidData => {
                next.spi.data = 0;
                if input.spi_ack {
                    let remaining = self.count - 1;
                    next.count = remaining;
                    if self.count <= RDID_BYTES {
                        next.id = (self.id << 8) | u32::from(input.spi_di);
                    }
                    if remaining == 1 {
                        // last byte is already in flight
                        next.spi.req = false;
                    }
                    if remaining == 0 {
                        effects.id = Some(next.id & 0xFF_FFFF);
                        debug!("rdid: {:#08x}", next.id & 0xFF_FFFF);
                        self.hold_cs_high(&mut next);
                    }
                }
            }
            MacState::OpiRead => {
                error!("OPI read not implemented");
                effects.unsupported = true;
                next.bus_err = true;
                next.state = MacState::Idle;
            }
            MacState::WriteCr2 => {
                error!("CR2 write not implemented");
                effects.unsupported = true;
                self.hold_cs_high(&mut next);
            }
        }
        (next, effects)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tock_registers::fields::FieldValue;

    fn command(value: FieldValue<u32, COMMAND::Register>) -> LocalRegisterCopy<u32, COMMAND::Register> {
        LocalRegisterCopy::new(value.value)
    }

    fn inputs<'a>(bus: &'a BusRequest) -> MacInputs<'a> {
        MacInputs {
            bus,
            command: LocalRegisterCopy::new(0),
            opi_mode: false,
            spi_ack: false,
            spi_di: 0,
        }
    }

    /// Step until `state` is reached, acknowledging any SPI request
    /// immediately with `di`.
    fn run_to(mac: Mac, bus: &BusRequest, state: MacState, limit: usize) -> Mac {
        let mut mac = mac;
        for _ in 0..limit {
            if mac.state() == state {
                return mac;
            }
            mac = mac.next(&inputs(bus)).0;
        }
        panic!("{:?} not reached, stuck in {:?}", state, mac.state());
    }

    #[test]
    fn reset_wakes_the_flash() {
        let bus = BusRequest::idle();
        let mac = Mac::new(Config::new());
        let mac = run_to(mac, &bus, MacState::WakeupCsWait, 4);
        assert!(mac.cs_n());
        let mac = run_to(mac, &bus, MacState::WakeupSend, 8);
        assert!(!mac.cs_n());
        let mac = run_to(mac, &bus, MacState::WakeupAckWait, 40);
        assert!(mac.spi_request().req);
        assert_eq!(mac.spi_request().data, OPCODE_WAKEUP);

        // stays here until the PHY acknowledges
        let mac = mac.next(&inputs(&bus)).0;
        assert_eq!(mac.state(), MacState::WakeupAckWait);
        assert!(!mac.spi_request().req);
        let ack = MacInputs {
            spi_ack: true,
            ..inputs(&bus)
        };
        let mac = mac.next(&ack).0;
        assert_eq!(mac.state(), MacState::CsHighHold);
        assert!(mac.cs_n());
        let mac = run_to(mac, &bus, MacState::Idle, 8);
        assert!(mac.cs_n());
    }

    #[test]
    fn wakeup_holds_chip_select_low() {
        let bus = BusRequest::idle();
        let mac = run_to(Mac::new(Config::new()), &bus, MacState::WakeupSend, 16);
        let mut ticks = 0;
        let mut mac = mac;
        while mac.state() == MacState::WakeupSend {
            mac = mac.next(&inputs(&bus)).0;
            ticks += 1;
        }
        assert_eq!(ticks, 32);
    }

    #[test]
    fn commands_follow_priority() {
        let bus = BusRequest::idle();
        let idle = Mac {
            state: MacState::Idle,
            ..Mac::new(Config::new())
        };
        let all = MacInputs {
            command: command(COMMAND::RDID::SET + COMMAND::WRCR2_00::SET + COMMAND::WAKEUP::SET),
            ..inputs(&bus)
        };
        let (mac, effects) = idle.next(&all);
        assert_eq!(mac.state(), MacState::WakeupPre);
        assert!(effects.clear_command);

        let cr2 = MacInputs {
            command: command(COMMAND::RDID::SET + COMMAND::WRCR2_00::SET),
            ..inputs(&bus)
        };
        let (mac, _) = idle.next(&cr2);
        assert_eq!(mac.state(), MacState::WriteCr2);
        let (mac, effects) = mac.next(&inputs(&bus));
        assert!(effects.unsupported);
        assert_eq!(mac.state(), MacState::CsHighHold);

        let rdid = MacInputs {
            command: command(COMMAND::RDID::SET),
            ..inputs(&bus)
        };
        let (mac, effects) = idle.next(&rdid);
        assert_eq!(mac.state(), MacState::RdidCsWait);
        assert!(effects.clear_command);
    }

    #[test]
    fn commands_invalidate_the_burst_cache() {
        let bus = BusRequest::idle();
        let idle = Mac {
            state: MacState::Idle,
            cs_n: false,
            cache: BurstAddressCache {
                address: 0x100,
                valid: true,
            },
            ..Mac::new(Config::new())
        };
        let rdid = MacInputs {
            command: command(COMMAND::RDID::SET),
            ..inputs(&bus)
        };
        let (mac, _) = idle.next(&rdid);
        assert!(!mac.cache().valid);
        assert!(mac.cs_n());
    }

    #[test]
    fn opi_read_fails_loudly() {
        let bus = BusRequest::read(0x40);
        let idle = Mac {
            state: MacState::Idle,
            protocol: ProtocolMode::Opi,
            ..Mac::new(Config::new())
        };
        let opi = MacInputs {
            opi_mode: true,
            ..inputs(&bus)
        };
        let (mac, _) = idle.next(&opi);
        assert_eq!(mac.state(), MacState::OpiRead);
        let (mac, effects) = mac.next(&opi);
        assert!(effects.unsupported);
        assert!(mac.bus_err());
        assert_eq!(mac.state(), MacState::Idle);
        // the held request is not taken as a new one while err is out
        let (mac, _) = mac.next(&opi);
        assert_eq!(mac.state(), MacState::Idle);
        assert!(!mac.bus_err());
    }

    #[test]
    fn writes_are_rejected() {
        let bus = BusRequest::write(0x40);
        let idle = Mac {
            state: MacState::Idle,
            ..Mac::new(Config::new())
        };
        let (mac, _) = idle.next(&inputs(&bus));
        assert!(mac.bus_err());
        assert_eq!(mac.state(), MacState::Idle);
        let (mac, _) = mac.next(&inputs(&bus));
        assert!(!mac.bus_err());
    }

    #[test]
    fn new_address_takes_full_path() {
        let bus = BusRequest::read(0x40);
        let idle = Mac {
            state: MacState::Idle,
            ..Mac::new(Config::new())
        };
        let (mac, _) = idle.next(&inputs(&bus));
        assert_eq!(mac.state(), MacState::SpiRead);
        assert_eq!(
            mac.cache(),
            BurstAddressCache {
                address: 0x100,
                valid: true
            }
        );
        let mac = run_to(mac, &bus, MacState::SpiReadOpcode, 8);
        assert!(!mac.cs_n());
        let mac = mac.next(&inputs(&bus)).0;
        assert_eq!(mac.spi_request().data, OPCODE_FAST_READ4);
        assert!(mac.spi_request().req);
    }

    #[test]
    fn matching_address_takes_fast_path() {
        let bus = BusRequest::read(0x41);
        let idle = Mac {
            state: MacState::Idle,
            cs_n: false,
            cache: BurstAddressCache {
                address: 0x104,
                valid: true,
            },
            ..Mac::new(Config::new())
        };
        let (mac, _) = idle.next(&inputs(&bus));
        assert_eq!(mac.state(), MacState::SpiRead);
        assert!(!mac.cs_n());
        let (mac, _) = mac.next(&inputs(&bus));
        assert_eq!(mac.state(), MacState::SpiReadData);
        assert!(mac.spi_request().req);
    }

    #[test]
    fn held_burst_continues_at_any_address() {
        let bus = BusRequest::burst(0x80);
        let streaming = Mac {
            state: MacState::Idle,
            cs_n: false,
            new_cycle: false,
            cache: BurstAddressCache {
                address: 0x104,
                valid: true,
            },
            ..Mac::new(Config::new())
        };
        let (mac, _) = streaming.next(&inputs(&bus));
        assert_eq!(mac.state(), MacState::SpiRead);
        assert!(!mac.cs_n());
        assert_eq!(mac.cache().address, 0x104);
        let (mac, _) = mac.next(&inputs(&bus));
        assert_eq!(mac.state(), MacState::SpiReadData);

        // the same beat after an idle tick restarts at its own address
        let restarted = Mac {
            new_cycle: true,
            ..streaming
        };
        let (mac, _) = restarted.next(&inputs(&bus));
        assert_eq!(mac.state(), MacState::SpiRead);
        assert!(mac.cs_n());
        assert_eq!(mac.cache().address, 0x200);

        // a classic cycle does not continue either
        let classic = BusRequest::read(0x80);
        let (mac, _) = streaming.next(&inputs(&classic));
        assert_eq!(mac.cache().address, 0x200);
    }

    #[test]
    fn address_bytes_are_masked() {
        let mac = Mac {
            cache: BurstAddressCache {
                address: 0xFF12_3456,
                valid: true,
            },
            ..Mac::new(Config::new())
        };
        assert_eq!(mac.address_byte(0), 0x07);
        assert_eq!(mac.address_byte(1), 0x12);
        assert_eq!(mac.address_byte(2), 0x34);
        assert_eq!(mac.address_byte(3), 0x56);
    }

    #[test]
    fn data_bytes_assemble_little_endian() {
        let mut mac = Mac {
            state: MacState::SpiRead,
            count: 3,
            cs_n: false,
            cache: BurstAddressCache {
                address: 0x100,
                valid: true,
            },
            ..Mac::new(Config::new())
        };
        let bus = BusRequest::read(0x40);
        for byte in [0x11u8, 0x22, 0x33, 0x44] {
            // request (or wait), then the acknowledge with data
            mac = mac.next(&inputs(&bus)).0;
            let ack = MacInputs {
                spi_ack: true,
                spi_di: byte,
                ..inputs(&bus)
            };
            mac = mac.next(&ack).0;
        }
        assert!(mac.bus_ack());
        assert_eq!(mac.dat_r(), 0x4433_2211);
        assert_eq!(mac.cache().address, 0x104);
        assert_eq!(mac.state(), MacState::Idle);
    }
}
