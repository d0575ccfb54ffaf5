// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Controller and flash model exercised through the bus and CSR
//! interfaces.

use spiopi::event_manager::EventRegisters;
use spiopi::registers::{Csr, COMMAND, CONFIG, DELAY_CONFIG, ECC_ERROR_EVENT};
use spiopi::{BusRequest, Config, CycleType, ErrorCode, PadOutputs};
use spiopi_sim::bench::Bench;
use spiopi_sim::flash::{FlashModel, Transaction, MANUFACTURER_ID};

fn memory() -> Vec<u8> {
    (0..4096u32)
        .map(|i| (i as u8) ^ ((i >> 8) as u8).wrapping_mul(17))
        .collect()
}

fn word_at(memory: &[u8], address: usize) -> u32 {
    u32::from_le_bytes([
        memory[address],
        memory[address + 1],
        memory[address + 2],
        memory[address + 3],
    ])
}

fn booted(flash: FlashModel) -> Bench {
    let mut bench = Bench::new(Config::new(), flash);
    bench.run_until_idle().unwrap();
    bench
}

/// Lengths of the chip-select high periods between two low periods.
fn cs_high_gaps(trace: &[PadOutputs]) -> Vec<usize> {
    let mut gaps = Vec::new();
    let mut seen_low = false;
    let mut run = 0;
    for pads in trace {
        if pads.cs_n {
            run += 1;
        } else {
            if seen_low && run > 0 {
                gaps.push(run);
            }
            seen_low = true;
            run = 0;
        }
    }
    gaps
}

/// Ticks at which SCLK toggled with chip select low.
fn clock_ticks(trace: &[PadOutputs]) -> Vec<usize> {
    trace
        .iter()
        .enumerate()
        .filter(|(_, pads)| !pads.cs_n && pads.sclk_en)
        .map(|(tick, _)| tick)
        .collect()
}

#[test]
fn reset_releases_flash_from_power_down() {
    let memory = memory();
    let bench = booted(FlashModel::new(&memory));
    assert!(!bench.flash().powered_down());
    assert_eq!(
        bench.flash().transactions(),
        [Transaction {
            mosi: vec![0xAB],
            clocks: 8,
        }]
    );
    assert!(bench.flash().active().is_none());
}

#[test]
fn single_read_issues_full_command() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));

    let bus = BusRequest::read(0x40);
    let mut phy_acks = Vec::new();
    let mut bus_acks = Vec::new();
    let mut value = 0;
    for tick in 0..400 {
        if bench.controller().spi_phy().ack() {
            phy_acks.push(tick);
        }
        let outputs = bench.step(&bus);
        if outputs.bus.ack {
            bus_acks.push(tick);
            value = outputs.bus.dat_r;
            break;
        }
    }
    for tick in 0..50 {
        if bench.step(&BusRequest::idle()).bus.ack {
            bus_acks.push(tick);
        }
    }

    // opcode, four address bytes, dummy byte, four data bytes
    assert_eq!(phy_acks.len(), 10);
    assert_eq!(bus_acks.len(), 1);
    assert_eq!(bus_acks[0], phy_acks[9] + 1);
    assert_eq!(value, word_at(&memory, 0x100));

    let active = bench.flash().active().unwrap();
    assert_eq!(
        active.mosi,
        [0x0C, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    );
    assert_eq!(active.clocks, 80);
}

#[test]
fn burst_continuation_skips_command_phase() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    assert_eq!(bench.read_word(0x40), Ok(word_at(&memory, 0x100)));
    let transactions = bench.flash().transactions().len();

    let bus = BusRequest::burst(0x41);
    let mut phy_acks = 0;
    let mut value = None;
    for _ in 0..200 {
        if bench.controller().spi_phy().ack() {
            phy_acks += 1;
        }
        let outputs = bench.step(&bus);
        if outputs.bus.ack {
            value = Some(outputs.bus.dat_r);
            break;
        }
    }
    assert_eq!(value, Some(word_at(&memory, 0x104)));
    assert_eq!(phy_acks, 4);
    assert_eq!(bench.flash().transactions().len(), transactions);
    let active = bench.flash().active().unwrap();
    assert_eq!(active.mosi.len(), 14);
    assert_eq!(active.opcode(), Some(0x0C));
}

#[test]
fn burst_reads_stream_from_one_command() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    let mut words = [0u32; 6];
    bench.read_burst(0x80, &mut words).unwrap();
    for (i, word) in words.iter().enumerate() {
        assert_eq!(*word, word_at(&memory, 0x200 + 4 * i));
    }
    let active = bench.flash().active().unwrap();
    assert_eq!(&active.mosi[..6], [0x0C, 0x00, 0x00, 0x02, 0x00, 0x00]);
    assert_eq!(active.mosi.len(), 6 + 4 * words.len());
}

/// Hold `bus` until it is acknowledged, without releasing it afterwards.
fn hold(bench: &mut Bench, bus: &BusRequest) -> u32 {
    for _ in 0..400 {
        let outputs = bench.step(bus);
        if outputs.bus.ack {
            return outputs.bus.dat_r;
        }
    }
    panic!("no ack for {:#x}", bus.adr);
}

#[test]
fn held_burst_streams_past_address_jump() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    let transactions = bench.flash().transactions().len();

    assert_eq!(hold(&mut bench, &BusRequest::burst(0x40)), word_at(&memory, 0x100));
    assert_eq!(bench.flash().active().unwrap().mosi.len(), 10);

    // no idle tick in between: the beat is served from the open stream
    assert_eq!(hold(&mut bench, &BusRequest::burst(0x80)), word_at(&memory, 0x104));
    bench.step(&BusRequest::idle());
    let active = bench.flash().active().unwrap();
    assert_eq!(active.mosi.len(), 14);
    assert_eq!(active.opcode(), Some(0x0C));
    assert_eq!(bench.flash().transactions().len(), transactions);
}

#[test]
fn sequential_read_keeps_chip_select_low() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    bench.record();
    assert_eq!(bench.read_word(0x40), Ok(word_at(&memory, 0x100)));
    assert_eq!(bench.read_word(0x41), Ok(word_at(&memory, 0x104)));

    assert!(cs_high_gaps(bench.trace()).is_empty());
    let clocks = clock_ticks(bench.trace());
    assert_eq!(clocks.len(), 80 + 32);
    // at least one clock-stopped tick between the two bus beats
    assert!(clocks[80] - clocks[79] >= 2);
}

#[test]
fn new_address_raises_chip_select() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    bench.record();
    assert_eq!(bench.read_word(0x40), Ok(word_at(&memory, 0x100)));
    assert_eq!(bench.read_word(0x80), Ok(word_at(&memory, 0x200)));

    let gaps = cs_high_gaps(bench.trace());
    assert_eq!(gaps.len(), 1);
    assert!(gaps[0] >= 4);
    assert_eq!(bench.flash().transactions().len(), 2);
    assert_eq!(
        bench.flash().active().unwrap().mosi[..5],
        [0x0C, 0x00, 0x00, 0x02, 0x00]
    );
}

#[test]
fn wakeup_command() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    assert_eq!(bench.read_word(0x40), Ok(word_at(&memory, 0x100)));

    bench.record();
    bench.command(COMMAND::WAKEUP::SET).unwrap();
    assert_eq!(bench.csr_read(Csr::Command), Ok(0));

    let last = bench.flash().transactions().last().unwrap();
    assert_eq!(last.mosi, [0xAB]);
    assert_eq!(last.clocks, 8);

    let trace = bench.trace();
    let gaps = cs_high_gaps(trace);
    assert_eq!(gaps.len(), 1);
    assert!(gaps[0] >= 4);
    let trailing = trace.iter().rev().take_while(|pads| pads.cs_n).count();
    assert!(trailing >= 4);

    // the burst cache was dropped with chip select, so this is a full read
    let transactions = bench.flash().transactions().len();
    assert_eq!(bench.read_word(0x41), Ok(word_at(&memory, 0x104)));
    assert_eq!(bench.flash().transactions().len(), transactions);
    assert_eq!(
        bench.flash().active().unwrap().mosi[..5],
        [0x0C, 0x00, 0x00, 0x01, 0x04]
    );
}

#[test]
fn rdid_reads_manufacturer_id() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    assert_eq!(bench.read_id(), Ok(0xC2_80_3B));
    let last = bench.flash().transactions().last().unwrap();
    assert_eq!(last.mosi, [0x9F, 0x00, 0x00, 0x00]);
    assert_eq!(last.clocks, 8 * (1 + MANUFACTURER_ID.len()));
    assert_eq!(bench.read_word(0x10), Ok(word_at(&memory, 0x40)));
}

#[test]
fn delay_taps_load_and_step() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    assert_eq!(bench.csr_read(Csr::DelayStatus), Ok(31));
    assert_eq!(bench.csr_read(Csr::DqsDelayStatus), Ok(0));

    let load = (DELAY_CONFIG::D.val(7) + DELAY_CONFIG::LOAD::SET).value;
    bench.csr_write(Csr::DelayConfig, load).unwrap();
    assert_eq!(bench.csr_read(Csr::DelayStatus), Ok(7));
    bench.csr_write(Csr::DelayConfig, 0).unwrap();

    let inc = (DELAY_CONFIG::INC::SET + DELAY_CONFIG::CE::SET).value;
    let dec = DELAY_CONFIG::CE::SET.value;
    for _ in 0..5 {
        bench.csr_write(Csr::DelayConfig, inc).unwrap();
    }
    assert_eq!(bench.csr_read(Csr::DelayStatus), Ok(12));
    for _ in 0..5 {
        bench.csr_write(Csr::DelayConfig, dec).unwrap();
    }
    assert_eq!(bench.csr_read(Csr::DelayStatus), Ok(7));
    // the strobe delay line is independent
    assert_eq!(bench.csr_read(Csr::DqsDelayStatus), Ok(0));
}

#[test]
fn ecc_events_latch_address_and_overflow() {
    let memory = memory();
    let bad = [0x200, 0x305];
    let mut bench = booted(FlashModel::new(&memory).with_bad_bytes(&bad));

    bench.read_word(0x80).unwrap();
    // live level is back high, no overflow
    assert_eq!(bench.csr_read(Csr::EccStatus), Ok(0b01));
    assert_eq!(bench.csr_read(Csr::EccAddress), Ok(0x200));

    bench.read_word(0x80).unwrap();
    bench.read_word(0xC1).unwrap();
    assert_eq!(bench.csr_read(Csr::EccStatus), Ok(0b11));
    assert_eq!(bench.csr_read(Csr::EccAddress), Ok(0x305));
    assert_eq!(bench.csr_read(Csr::EccStatus), Ok(0b01));
}

#[test]
fn ecc_event_interrupt() {
    let memory = memory();
    let bad = [0x102];
    let mut bench = booted(FlashModel::new(&memory).with_bad_bytes(&bad));
    bench.csr_write(Csr::EvEnable, 1 << ECC_ERROR_EVENT).unwrap();
    assert!(!bench.controller().outputs().irq);

    bench.read_word(0x40).unwrap();
    assert!(bench.controller().outputs().irq);
    let events = EventRegisters::new(bench.controller().registers());
    assert_eq!(events.next_asserted(), Some(ECC_ERROR_EVENT));
    assert!(events.event_source_input(ECC_ERROR_EVENT));

    events.clear_event(ECC_ERROR_EVENT).unwrap();
    bench.run(1);
    assert!(!bench.controller().outputs().irq);
    assert_eq!(bench.csr_read(Csr::EvPending), Ok(0));
}

#[test]
fn opi_reads_fail_loudly() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    let config = (CONFIG::OPI_MODE::SET + CONFIG::DUMMY.val(10)).value;
    bench.csr_write(Csr::Config, config).unwrap();

    assert_eq!(bench.read_word(0x40), Err(ErrorCode::FAIL));
    assert_eq!(bench.csr_read(Csr::MacStatus), Ok(0b11));
    assert_eq!(bench.csr_read(Csr::MacStatus), Ok(0b10));

    // back in SPI mode the controller still works
    bench.csr_write(Csr::Config, CONFIG::DUMMY.val(10).value).unwrap();
    assert_eq!(bench.read_word(0x40), Ok(word_at(&memory, 0x100)));
}

#[test]
fn cr2_write_is_reported_unsupported() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    bench.command(COMMAND::WRCR2_00::SET).unwrap();
    assert_eq!(bench.csr_read(Csr::MacStatus), Ok(0b11));
    assert_eq!(bench.read_id(), Ok(0xC2_80_3B));
}

#[test]
fn writes_are_answered_with_error() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    assert_eq!(bench.write_word(0x40), Err(ErrorCode::FAIL));
    assert_eq!(bench.read_word(0x40), Ok(word_at(&memory, 0x100)));
}

#[test]
fn end_of_burst_requests_are_ignored() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    let bus = BusRequest {
        cti: CycleType::EndOfBurst,
        ..BusRequest::read(0x40)
    };
    for _ in 0..200 {
        let outputs = bench.step(&bus);
        assert!(!outputs.bus.ack && !outputs.bus.err);
    }
    assert!(bench.flash().active().is_none());
}

#[test]
fn register_interface_errors() {
    let memory = memory();
    let mut bench = booted(FlashModel::new(&memory));
    assert_eq!(
        bench.controller().registers().read(0x38),
        Err(ErrorCode::INVAL)
    );
    assert_eq!(bench.csr_write(Csr::Id, 1), Err(ErrorCode::NOSUPPORT));
    assert_eq!(
        bench.csr_write(Csr::MacStatus, 0),
        Err(ErrorCode::NOSUPPORT)
    );
}
