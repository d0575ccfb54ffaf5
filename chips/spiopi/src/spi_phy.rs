// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! SPI cycle engine.
//!
//! Serializes one byte per request, MSB first, on the single-bit MOSI
//! lane and deserializes MISO into `di`. A cycle is started by a level
//! `req`; the engine acknowledges every byte with a one-tick `ack` pulse
//! and `di` is valid in the same tick as `ack`. Holding `req` across the
//! end of a byte reloads the shift register without a dead cycle, so a
//! sequencer can stream bytes back to back by keeping `req` high and
//! updating `data` after each acknowledgement.
//!
//! A request with `has_dummy` set is followed by `config.dummy` clocked
//! cycles during which MOSI is held low; the byte is acknowledged only
//! after the dummy cycles have elapsed.
//!
//! ```text
//!  tick      t0   t0+1 ... t0+8 t0+9 t0+10
//!  req       1    ...
//!  clk_en    0    1    ... 1    0
//!  mosi           b7   ... b0
//!  ack                               1
//! ```

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpiPhyState {
    Reset,
    Req,
    Dummy,
}

/// Request lines driven by the sequencer.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpiCycleRequest {
    pub req: bool,
    pub data: u8,
    pub has_dummy: bool,
}

impl SpiCycleRequest {
    pub const fn idle() -> SpiCycleRequest {
        SpiCycleRequest {
            req: false,
            data: 0,
            has_dummy: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpiPhy {
    state: SpiPhyState,
    count: u8,
    clk_en: bool,
    /// Output shift register; bit 7 is on MOSI
    so: u8,
    /// Input shift register, fed by MISO every tick
    si: u8,
    di: u8,
    /// Dummy cycles pending after the current byte
    dummy: bool,
    /// Registered byte-complete pulse, loads `di` on the following tick
    di_load: bool,
    ack_pipe: bool,
    ack: bool,
}

impl SpiPhy {
    pub const fn new() -> SpiPhy {
        SpiPhy {
            state: SpiPhyState::Reset,
            count: 0,
            clk_en: false,
            so: 0,
            si: 0,
            di: 0,
            dummy: false,
            di_load: false,
            ack_pipe: false,
            ack: false,
        }
    }

    pub fn state(&self) -> SpiPhyState {
        self.state
    }

    pub fn clk_en(&self) -> bool {
        self.clk_en
    }

    pub fn mosi(&self) -> bool {
        self.so & 0x80 != 0
    }

    pub fn ack(&self) -> bool {
        self.ack
    }

    pub fn di(&self) -> u8 {
        self.di
    }

    pub fn next(&self, request: &SpiCycleRequest, miso: bool, dummy_cycles: u8) -> SpiPhy {
        let shifted_in = (self.si << 1) | u8::from(miso);
        let mut next = SpiPhy {
            si: shifted_in,
            di: if self.di_load { shifted_in } else { self.di },
            di_load: false,
            ack: self.ack_pipe,
            ..*self
        };

        match self.state {
            SpiPhyState::Reset => {
                if request.req {
                    next.state = SpiPhyState::Req;
                    next.count = 7;
                    next.clk_en = true;
                    next.so = request.data;
                    next.dummy = request.has_dummy;
                    next.ack_pipe = false;
                } else {
                    next.clk_en = false;
                    next.ack_pipe = false;
                    next.count = 0;
                    next.dummy = false;
                }
            }
            SpiPhyState::Req => {
                if self.count > 0 {
                    next.count = self.count - 1;
                    next.clk_en = true;
                    next.so = self.so << 1;
                    next.ack_pipe = false;
                } else if request.req && !self.dummy {
                    // back-to-back byte, no dead cycle
                    next.count = 7;
                    next.clk_en = true;
                    next.so = request.data;
                    next.di_load = true;
                    next.ack_pipe = true;
                    next.dummy = request.has_dummy;
                } else if !self.dummy {
                    next.di_load = true;
                    next.ack_pipe = true;
                    next.clk_en = false;
                    next.state = SpiPhyState::Reset;
                } else {
                    next.di_load = true;
                    next.count = dummy_cycles;
                    next.clk_en = true;
                    next.ack_pipe = false;
                    next.so = 0;
                    next.state = SpiPhyState::Dummy;
                }
            }
            SpiPhyState::Dummy => {
                if self.count > 1 {
                    next.count = self.count - 1;
                    next.clk_en = true;
                } else if (self.count <= 1) && request.req {
                    next.state = SpiPhyState::Req;
                    next.clk_en = true;
                    next.count = 7;
                    next.so = request.data;
                    next.ack_pipe = true;
                    next.dummy = request.has_dummy;
                } else {
                    next.clk_en = false;
                    next.ack_pipe = true;
                    next.state = SpiPhyState::Reset;
                }
            }
        }
        next
    }
}
