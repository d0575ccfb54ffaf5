// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Wishbone-style memory bus signals.

/// Cycle type identifier (`cti`).
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(u8)]
pub enum CycleType {
    Classic = 0,
    ConstantAddress = 1,
    IncrementingBurst = 2,
    EndOfBurst = 7,
}

/// Master side of the bus for one tick. `adr` is a word address.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BusRequest {
    pub cyc: bool,
    pub stb: bool,
    pub we: bool,
    pub adr: u32,
    pub cti: CycleType,
}

impl BusRequest {
    pub const fn idle() -> BusRequest {
        BusRequest {
            cyc: false,
            stb: false,
            we: false,
            adr: 0,
            cti: CycleType::Classic,
        }
    }

    pub const fn read(adr: u32) -> BusRequest {
        BusRequest {
            cyc: true,
            stb: true,
            we: false,
            adr,
            cti: CycleType::Classic,
        }
    }

    /// One beat of an incrementing burst.
    pub const fn burst(adr: u32) -> BusRequest {
        BusRequest {
            cyc: true,
            stb: true,
            we: false,
            adr,
            cti: CycleType::IncrementingBurst,
        }
    }

    pub const fn write(adr: u32) -> BusRequest {
        BusRequest {
            cyc: true,
            stb: true,
            we: true,
            adr,
            cti: CycleType::Classic,
        }
    }

    pub fn active(&self) -> bool {
        self.cyc && self.stb
    }
}

/// Slave side of the bus for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BusResponse {
    pub ack: bool,
    pub err: bool,
    pub dat_r: u32,
}
