// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Input delay line calibration.
//!
//! Models the tap counter of an IDELAYE2-style delay element. The counter
//! is controlled through a `*_delay_config` register:
//!
//! - `load` is a level: while set, the tap count follows `d`,
//! - `ce` is a pulse produced by a register write; it steps the tap count
//!   by one in the direction given by `inc`,
//! - `load` takes priority over `ce`.
//!
//! The tap count wraps modulo 32 in both directions.

use tock_registers::LocalRegisterCopy;

use crate::config::DelayType;
use crate::registers::DELAY_CONFIG;

pub const DELAY_TAPS: u8 = 32;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelayLine {
    taps: u8,
    delay_type: DelayType,
}

impl DelayLine {
    pub fn new(taps: u8, delay_type: DelayType) -> DelayLine {
        DelayLine {
            taps: taps % DELAY_TAPS,
            delay_type,
        }
    }

    /// Current tap count (`q`).
    pub fn taps(&self) -> u8 {
        self.taps
    }

    /// `pulse` is true in the tick following a write of the config
    /// register; only then is `ce` honored.
    pub fn next(&self, cfg: LocalRegisterCopy<u32, DELAY_CONFIG::Register>, pulse: bool) -> DelayLine {
        if self.delay_type == DelayType::Fixed {
            return *self;
        }
        let taps = if cfg.is_set(DELAY_CONFIG::LOAD) {
            cfg.read(DELAY_CONFIG::D) as u8
        } else if pulse && cfg.is_set(DELAY_CONFIG::CE) {
            if cfg.is_set(DELAY_CONFIG::INC) {
                (self.taps + 1) % DELAY_TAPS
            } else {
                (self.taps + DELAY_TAPS - 1) % DELAY_TAPS
            }
        } else {
            self.taps
        };
        DelayLine { taps, ..*self }
    }
}
