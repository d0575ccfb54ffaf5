// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! ECS_N error monitor.
//!
//! The flash pulls ECS_N low while it outputs data it had to correct. The
//! pin is asynchronous to `sys` and is only a rough guide, so it is
//! synchronized through two flops and only its falling edge is used. On
//! each edge the current burst address is latched; a second edge before
//! software acknowledged the first sets the sticky overflow flag.
//!
//! An acknowledgement that arrives in the same tick as a new edge is
//! dropped: the new event stays pending, and since the previous one was
//! not yet cleared, overflow is set. Software sees this as an overflow on
//! its next `ecc_status` read and must acknowledge again.

use crate::synchronizer::Synchronizer;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorMonitor {
    sync: Synchronizer<2>,
    delayed: bool,
    pending: bool,
    address: u32,
    overflow: bool,
}

/// Software accesses seen since the previous tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ErrorAck {
    /// `ecc_status` was read or written
    pub status: bool,
    /// `ecc_address` was read
    pub address: bool,
}

impl ErrorMonitor {
    pub const fn new() -> ErrorMonitor {
        ErrorMonitor {
            sync: Synchronizer::new(true),
            delayed: true,
            pending: false,
            address: 0,
            overflow: false,
        }
    }

    /// Synchronized ECS_N level.
    pub fn live(&self) -> bool {
        self.sync.output()
    }

    pub fn falling_edge(&self) -> bool {
        self.delayed && !self.live()
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn overflow(&self) -> bool {
        self.overflow
    }

    /// `address` is the burst address at the time of this tick.
    pub fn next(&self, ecs_n: bool, address: u32, ack: ErrorAck) -> ErrorMonitor {
        let mut next = ErrorMonitor {
            sync: self.sync.next(ecs_n),
            delayed: self.live(),
            ..*self
        };
        if self.falling_edge() {
            next.address = address;
            next.overflow = self.overflow || self.pending;
            next.pending = true;
        } else {
            if ack.status {
                next.overflow = false;
                next.pending = false;
            }
            if ack.address {
                next.pending = false;
            }
        }
        next
    }
}
