// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Demo: boot the controller, identify the flash and read from it.

use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};
use spiopi::registers::Csr;
use spiopi::{Config, ErrorCode};
use spiopi_sim::bench::Bench;
use spiopi_sim::flash::FlashModel;
use spiopi_sim::logger;

const FLASH_SIZE: usize = 64 * 1024;

#[derive(Parser, Debug)]
#[command(about = "Run the SPI / OPI flash controller against a flash model")]
struct Args {
    /// Log level: off, error, warn, info, debug or trace
    #[arg(default_value = "info")]
    level: LevelFilter,
}

fn demo(bench: &mut Bench) -> Result<(), ErrorCode> {
    bench.run_until_idle()?;
    info!("controller idle after {} ticks", bench.ticks());

    let id = bench.read_id()?;
    info!("flash id: {:06x}", id);

    let start = bench.ticks();
    let word = bench.read_word(0x40)?;
    info!("word 0x40: {:08x} ({} ticks)", word, bench.ticks() - start);

    let start = bench.ticks();
    let mut burst = [0u32; 8];
    bench.read_burst(0x41, &mut burst)?;
    info!(
        "burst 0x41..0x49: {:08x?} ({} ticks)",
        burst,
        bench.ticks() - start
    );

    let status = bench.csr_read(Csr::EccStatus)?;
    let address = bench.csr_read(Csr::EccAddress)?;
    info!("ecc status {:#x}, last event at {:#010x}", status, address);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if logger::init(args.level).is_err() {
        eprintln!("logger already installed");
        return ExitCode::FAILURE;
    }

    let memory: Vec<u8> = (0..FLASH_SIZE)
        .map(|i| (i as u8).wrapping_mul(31) ^ (i >> 8) as u8)
        .collect();
    let bad = [0x110];
    let flash = FlashModel::new(&memory).with_bad_bytes(&bad);
    let mut bench = Bench::new(Config::new(), flash);

    match demo(&mut bench) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("demo failed: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn level_argument() {
        let args = Args::try_parse_from(["spiopi-sim"]).unwrap();
        assert_eq!(args.level, LevelFilter::Info);
        let args = Args::try_parse_from(["spiopi-sim", "TRACE"]).unwrap();
        assert_eq!(args.level, LevelFilter::Trace);
        assert!(Args::try_parse_from(["spiopi-sim", "verbose"]).is_err());
    }
}
