// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Host simulation of the SPI / OPI flash controller attached to a
//! behavioral flash model.

pub mod bench;
pub mod flash;
pub mod logger;
