// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! OPI DTR cycle engine.
//!
//! One 16-bit word is transferred per tick: the high byte on the rising
//! edge and the low byte on the falling edge. Received words put the
//! first-sampled (rising edge) byte in the low-order position.
//!
//! A transmit request with `has_dummy` drives the word for one tick and
//! then `config.dummy` ticks of zeros before the acknowledgement. The
//! only valid follow-up to a dummy phase is a receive request; a transmit
//! request arriving during the dummy phase is handled once the engine is
//! back in `Idle`.

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OpiPhyState {
    Idle,
    RxPipe,
    Dummy,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OpiCycleRequest {
    pub tx: bool,
    pub rx: bool,
    pub data: u16,
    pub has_dummy: bool,
}

impl OpiCycleRequest {
    pub const fn idle() -> OpiCycleRequest {
        OpiCycleRequest {
            tx: false,
            rx: false,
            data: 0,
            has_dummy: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OpiPhy {
    state: OpiPhyState,
    count: u8,
    clk_en: bool,
    tx: bool,
    dout: u16,
    di: u16,
    ack: bool,
}

impl OpiPhy {
    pub const fn new() -> OpiPhy {
        OpiPhy {
            state: OpiPhyState::Idle,
            count: 0,
            clk_en: false,
            tx: false,
            dout: 0,
            di: 0,
            ack: false,
        }
    }

    pub fn state(&self) -> OpiPhyState {
        self.state
    }

    pub fn clk_en(&self) -> bool {
        self.clk_en
    }

    /// The engine is driving the data lanes this tick.
    pub fn tx(&self) -> bool {
        self.tx
    }

    pub fn ack(&self) -> bool {
        self.ack
    }

    pub fn di(&self) -> u16 {
        self.di
    }

    /// Byte presented on the rising edge.
    pub fn dq_rise(&self) -> u8 {
        (self.dout >> 8) as u8
    }

    /// Byte presented on the falling edge.
    pub fn dq_fall(&self) -> u8 {
        self.dout as u8
    }

    /// `sample` is the word captured from the lanes in this tick.
    pub fn next(&self, request: &OpiCycleRequest, sample: u16, dummy_cycles: u8) -> OpiPhy {
        let mut next = *self;
        match self.state {
            OpiPhyState::Idle => {
                if request.tx && !request.has_dummy {
                    next.clk_en = true;
                    next.tx = true;
                    next.dout = request.data;
                    next.ack = true;
                } else if request.tx && request.has_dummy {
                    next.state = OpiPhyState::Dummy;
                    next.clk_en = true;
                    next.tx = true;
                    next.dout = request.data;
                    next.count = dummy_cycles;
                    next.ack = false;
                } else if request.rx {
                    next.state = OpiPhyState::RxPipe;
                    next.clk_en = true;
                    next.tx = false;
                    next.ack = false;
                } else {
                    next.clk_en = false;
                    next.tx = false;
                    next.ack = false;
                    next.count = 0;
                }
            }
            OpiPhyState::RxPipe => {
                next.di = sample;
                next.ack = true;
                next.tx = false;
                if !request.rx {
                    next.state = OpiPhyState::Idle;
                    next.clk_en = false;
                } else {
                    next.clk_en = true;
                }
            }
            OpiPhyState::Dummy => {
                if self.count > 0 {
                    next.count = self.count - 1;
                    next.dout = 0;
                    next.clk_en = true;
                } else if request.rx {
                    next.state = OpiPhyState::RxPipe;
                    next.clk_en = true;
                    next.tx = false;
                    next.ack = true;
                } else {
                    next.state = OpiPhyState::Idle;
                    next.clk_en = false;
                    next.tx = false;
                    next.ack = true;
                }
            }
        }
        next
    }
}
