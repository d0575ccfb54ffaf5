// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Cycle-accurate model of a dual-mode SPI / OPI DTR flash controller.
//!
//! The controller maps a read-only memory bus window onto a Macronix-style
//! octal flash. It is split into two levels:
//!
//! - the MAC ([`mac`]) receives bus reads and special commands from the
//!   CSR bank and turns them into byte-level cycles, and owns chip select,
//! - the PHYs ([`spi_phy`], [`opi_phy`]) serialize, deserialize, count
//!   dummy cycles and manage the clock enable.
//!
//! The flash boots into SPI mode; OPI is only used once `config.opi_mode`
//! is set.

#![no_std]

pub mod bus;
pub mod config;
pub mod delay;
pub mod ecc;
pub mod errorcode;
pub mod event_manager;
pub mod mac;
pub mod mux;
pub mod opi_phy;
pub mod registers;
pub mod spi_phy;
pub mod spinor;
pub mod spiopi;
pub mod synchronizer;

pub use crate::bus::{BusRequest, BusResponse, CycleType};
pub use crate::config::{Config, DelayType};
pub use crate::errorcode::ErrorCode;
pub use crate::mux::{PadInputs, PadOutputs, ProtocolMode};
pub use crate::spiopi::{Outputs, SpiOpi};
