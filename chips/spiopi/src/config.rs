// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Build-time parameters of a controller instance.
//!
//! These correspond to the elaboration parameters of the gateware: values
//! fixed when the SoC is built, as opposed to the run-time configuration
//! exposed through the CSR bank.

/// Behavior of the input delay lines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DelayType {
    /// Tap count is fixed at its reset value; `load` and `ce` are ignored.
    Fixed,
    /// Tap count may be loaded and stepped at run time.
    VarLoad,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Reset tap count of the data-strobe (DQS) delay line.
    pub dqs_delay_taps: u8,
    /// Reset tap count of the data-line (DQ) delay lines.
    pub dq_delay_taps: u8,
    pub delay_type: DelayType,
    /// Reset value of `config.dummy`.
    pub dummy_cycles: u8,
    /// Mask applied to the most significant address byte. The default of
    /// `0x07` limits the flash window to 27 bits (128 MiB).
    pub address_mask_high: u8,
    /// Chip-select high time around every operation other than a
    /// sequential read.
    pub cs_high_cycles: u8,
    /// Cycles chip-select is held low before the wakeup opcode is sent.
    pub wakeup_hold_cycles: u8,
}

impl Config {
    pub const fn new() -> Config {
        Config {
            dqs_delay_taps: 0,
            dq_delay_taps: 31,
            delay_type: DelayType::VarLoad,
            dummy_cycles: 10,
            address_mask_high: 0x07,
            cs_high_cycles: 4,
            wakeup_hold_cycles: 32,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}
