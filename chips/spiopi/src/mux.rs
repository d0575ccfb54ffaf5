// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Pad-level mode multiplexer.
//!
//! Lane 0 doubles as MOSI in SPI mode and lane 1 carries MISO. Inputs are
//! never multiplexed: both engines see every sample and only the engine
//! selected by the sequencer acts on it.

use crate::opi_phy::OpiPhy;
use crate::spi_phy::SpiPhy;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProtocolMode {
    Spi,
    Opi,
}

const MOSI_LANE: u8 = 1 << 0;
const MISO_LANE: u8 = 1 << 1;

/// Levels driven onto the flash pads for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PadOutputs {
    pub cs_n: bool,
    /// SCLK toggles during this tick
    pub sclk_en: bool,
    pub dq_rise: u8,
    pub dq_fall: u8,
    /// Per-lane output enable
    pub dq_oe: u8,
}

impl PadOutputs {
    pub const fn idle() -> PadOutputs {
        PadOutputs {
            cs_n: true,
            sclk_en: false,
            dq_rise: 0,
            dq_fall: 0,
            dq_oe: 0,
        }
    }

    /// MOSI level in SPI mode.
    pub fn mosi(&self) -> bool {
        self.dq_rise & MOSI_LANE != 0
    }
}

/// Levels sampled from the flash pads in one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PadInputs {
    pub dq_rise: u8,
    pub dq_fall: u8,
    /// ECC error indicator, active low, asynchronous
    pub ecs_n: bool,
}

impl PadInputs {
    pub const fn idle() -> PadInputs {
        PadInputs {
            dq_rise: 0,
            dq_fall: 0,
            ecs_n: true,
        }
    }
}

pub fn drive(mode: ProtocolMode, cs_n: bool, spi: &SpiPhy, opi: &OpiPhy) -> PadOutputs {
    let spi_mode = mode == ProtocolMode::Spi;

    let sclk_en = if spi_mode { spi.clk_en() } else { opi.clk_en() };

    let mut dq_oe = 0;
    if !spi_mode && opi.tx() {
        dq_oe |= !MOSI_LANE;
    }
    if spi_mode || opi.tx() {
        dq_oe |= MOSI_LANE;
    }

    let (lane0_rise, lane0_fall) = if spi_mode {
        let mosi = if spi.mosi() { MOSI_LANE } else { 0 };
        (mosi, mosi)
    } else {
        (opi.dq_rise() & MOSI_LANE, opi.dq_fall() & MOSI_LANE)
    };

    PadOutputs {
        cs_n,
        sclk_en,
        dq_rise: (opi.dq_rise() & !MOSI_LANE) | lane0_rise,
        dq_fall: (opi.dq_fall() & !MOSI_LANE) | lane0_fall,
        dq_oe,
    }
}

/// Returns the SPI MISO bit and the OPI word captured this tick.
pub fn sample(pads: &PadInputs) -> (bool, u16) {
    let miso = pads.dq_fall & MISO_LANE != 0;
    let word = (u16::from(pads.dq_fall) << 8) | u16::from(pads.dq_rise);
    (miso, word)
}
