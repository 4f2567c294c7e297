use peen::pattern::{WORD_CHUNKS, Word, replicate, word_chunks};
use peen::{
    HostDriver, HostError, MemoryPort, PortGeometry, RefreshControl, RowHammerTester, TargetRow,
    feedback,
};
use peen_sim::{Backpressure, SimPort, SimRefresh};
use rand::Rng;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Collapses a command-address stream into (address, run length) pairs.
fn runs(reads: &[u32]) -> Vec<(u32, u32)> {
    let mut out: Vec<(u32, u32)> = vec![];
    for &addr in reads {
        match out.last_mut() {
            Some((last, count)) if *last == addr => *count += 1,
            _ => out.push((addr, 1)),
        }
    }
    out
}

#[test]
fn test_clean_run_finds_no_errors() -> anyhow::Result<()> {
    init_logging();
    let geometry = PortGeometry::new(8, 1, 2);
    let mut port = SimPort::new(geometry);
    let mut refresh = SimRefresh::default();
    let mut tester = RowHammerTester::new(geometry);
    let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);

    let pattern: u32 = rand::rng().random();
    driver.set_pattern(0, pattern)?;
    driver.set_target_row(0, TargetRow {
        address: 0x40,
        frequency: 50,
    })?;
    driver.set_active_count(1)?;

    let summary = driver.run()?;
    assert_eq!(summary.baseline_errors, 0);
    assert_eq!(summary.flip_errors, 0);
    assert!(summary.errors.is_empty());

    // memory is left filled with the replicated pattern
    assert!(port.memory().iter().all(|&word| word == replicate(pattern)));
    Ok(())
}

#[test]
fn test_weak_cell_flip_is_reported() -> anyhow::Result<()> {
    init_logging();
    let geometry = PortGeometry::new(8, 1, 2);
    let mut port = SimPort::with_options(geometry, 4, Backpressure::None, 0);
    let mut refresh = SimRefresh::default();

    // victim word at address 7, aggressor row 4; the threshold is well
    // above what the two verify scans contribute
    let mask: Word = 1 << 7;
    port.weaken(7, mask, 4, 100);

    let mut tester = RowHammerTester::new(geometry);
    let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);
    driver.set_pattern(0, 0xA5A5A5A5)?;
    driver.set_target_row(0, TargetRow {
        address: 0x20,
        frequency: 200,
    })?;
    driver.set_active_count(1)?;

    let summary = driver.run()?;
    assert_eq!(summary.baseline_errors, 0);
    assert_eq!(summary.flip_errors, 1);
    assert_eq!(summary.errors.len(), 1);

    let report = &summary.errors[0];
    assert_eq!(report.address, 7);
    assert_eq!(report.row, 0);
    assert!(!report.before_hammer);
    assert_eq!(report.data, word_chunks(replicate(0xA5A5A5A5) ^ mask));
    Ok(())
}

#[test]
fn test_out_of_band_flips_each_reported_once() -> anyhow::Result<()> {
    init_logging();
    let geometry = PortGeometry::new(6, 1, 2);
    let mut port = SimPort::new(geometry);
    let mut refresh = SimRefresh::default();
    let mut tester = RowHammerTester::new(geometry);

    {
        let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);
        driver.set_pattern(0, 0xA5A5A5A5)?;
    }

    // corrupt three words once the fill has finished; addresses well away
    // from the tail, whose writes may still sit in the port queue
    let flips: [(u32, Word); 3] = [(3, 1 << 5), (17, 1 << 40), (40, 1)];
    let mut injected = false;
    let mut reported: Vec<(u32, [u32; WORD_CHUNKS])> = vec![];

    tester.registers_mut().hammer_start = true;
    for _ in 0..1_000_000 {
        tester.step(&mut port, &mut refresh);
        port.tick();
        if !injected && tester.registers().phase() == feedback::VERIFY {
            for &(address, mask) in &flips {
                port.flip_bits(address, mask);
            }
            injected = true;
        }
        if tester.registers().error_found {
            reported.push((
                tester.registers().scan_address,
                tester.registers().error_data,
            ));
            tester.registers_mut().error_ack = true;
            tester.step(&mut port, &mut refresh);
            port.tick();
            tester.registers_mut().error_ack = false;
            tester.step(&mut port, &mut refresh);
            port.tick();
        }
        if tester.registers().phase() == feedback::INIT_SETTINGS {
            break;
        }
    }

    // the replay yields exactly the corrupted addresses, in address order,
    // each with the corrupted datum, and nothing else
    assert!(injected);
    assert_eq!(tester.registers().error_count, 3);
    let expected: Vec<(u32, [u32; WORD_CHUNKS])> = flips
        .iter()
        .map(|&(address, mask)| (address, word_chunks(replicate(0xA5A5A5A5) ^ mask)))
        .collect();
    assert_eq!(reported, expected);
    Ok(())
}

#[test]
fn test_hammer_access_order_and_counts() -> anyhow::Result<()> {
    init_logging();
    let geometry = PortGeometry::new(8, 1, 2);
    let mut port = SimPort::new(geometry);
    let mut refresh = SimRefresh::default();
    let mut tester = RowHammerTester::new(geometry);
    let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);

    driver.set_target_row(0, TargetRow {
        address: 0x40,
        frequency: 3,
    })?;
    driver.set_target_row(1, TargetRow {
        address: 0x60,
        frequency: 5,
    })?;
    driver.set_active_count(2)?;
    driver.set_pair_repeat(0, 2)?;
    driver.set_cycle_repeat(2)?;

    driver.run()?;

    // the log reads: fill writes, first verify scan, the hammer block,
    // second verify scan; the hammer block sits between the read of the
    // last address and the read restarting at zero
    let log = port.command_log();
    let max = geometry.max_address();
    let scan_end = log
        .iter()
        .position(|cmd| !cmd.write && cmd.address == max)
        .expect("no verify scan in the log");
    let hammer: Vec<u32> = log[scan_end + 1..]
        .iter()
        .take_while(|cmd| cmd.address != 0)
        .map(|cmd| cmd.address)
        .collect();

    let one_cycle = vec![(0x40, 3), (0x60, 5), (0x40, 3), (0x60, 5)];
    let expected: Vec<(u32, u32)> = one_cycle
        .iter()
        .cycle()
        .take(one_cycle.len() * 2)
        .copied()
        .collect();
    assert_eq!(runs(&hammer), expected);
    Ok(())
}

#[test]
fn test_double_pattern_alternates_rows() -> anyhow::Result<()> {
    init_logging();
    let geometry = PortGeometry::new(7, 1, 2);
    let mut port = SimPort::new(geometry);
    let mut refresh = SimRefresh::default();
    let mut tester = RowHammerTester::new(geometry);
    let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);

    driver.set_pattern(0, 0xFFFF0000)?;
    driver.set_pattern(1, 0x0000FFFF)?;
    driver.set_double_pattern(true);

    let summary = driver.run()?;
    assert_eq!(summary.baseline_errors, 0);
    assert_eq!(summary.flip_errors, 0);

    // even rows carry the first pattern, odd rows the second
    let row_span = geometry.row_span();
    for address in 0..geometry.word_count() {
        let expected = if (address / row_span) % 2 == 1 {
            replicate(0x0000FFFF)
        } else {
            replicate(0xFFFF0000)
        };
        assert_eq!(port.word(address), expected, "address {:#x}", address);
    }
    Ok(())
}

#[test]
fn test_refresh_settings_restored_after_run() -> anyhow::Result<()> {
    init_logging();
    let geometry = PortGeometry::new(7, 1, 2);
    let mut port = SimPort::new(geometry);
    let mut refresh = SimRefresh::default();
    let baseline = refresh.refresh_interval();

    let mut tester = RowHammerTester::new(geometry);
    let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);
    driver.set_refresh(true, 39, true);
    driver.run()?;

    assert_eq!(refresh.refresh_interval(), baseline);
    assert!(refresh.refresh_enabled());
    assert!(!refresh.auto_precharge());

    // refresh fully off during the hammer phase comes back on as well
    let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);
    driver.set_refresh(false, 0, false);
    driver.run()?;
    assert!(refresh.refresh_enabled());
    Ok(())
}

#[test]
fn test_rejected_configuration_surfaces() -> anyhow::Result<()> {
    init_logging();
    let geometry = PortGeometry::new(6, 1, 2);
    let mut port = SimPort::new(geometry);
    let mut refresh = SimRefresh::default();
    let mut tester = RowHammerTester::new(geometry);
    let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);

    let result = driver.set_target_row(20, TargetRow {
        address: 0,
        frequency: 1,
    });
    assert!(matches!(result, Err(HostError::Rejected(_))));

    let result = driver.set_active_count(0);
    assert!(matches!(result, Err(HostError::Rejected(_))));

    // the core stays usable after a rejection
    driver.set_active_count(1)?;
    driver.run()?;
    Ok(())
}

#[test]
fn test_configuration_readback() -> anyhow::Result<()> {
    init_logging();
    let geometry = PortGeometry::new(6, 1, 2);
    let mut port = SimPort::new(geometry);
    let mut refresh = SimRefresh::default();
    let mut tester = RowHammerTester::new(geometry);
    let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);

    let row = TargetRow {
        address: 0x2A,
        frequency: 17,
    };
    driver.set_target_row(4, row)?;
    assert_eq!(driver.target_row(4)?, row);

    // slots past the frequency-bearing ones pin their frequency to 1
    driver.set_target_row(12, TargetRow {
        address: 0x30,
        frequency: 9,
    })?;
    assert_eq!(driver.target_row(12)?.frequency, 1);
    Ok(())
}

#[test]
fn test_run_completes_under_backpressure() -> anyhow::Result<()> {
    init_logging();
    let geometry = PortGeometry::new(7, 1, 2);
    let mut port = SimPort::with_options(
        geometry,
        8,
        Backpressure::Random { deny_percent: 60 },
        1234,
    );
    let mut refresh = SimRefresh::default();
    let mut tester = RowHammerTester::new(geometry);
    let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);

    driver.set_pattern(0, 0xDEADBEEF)?;
    driver.set_target_row(0, TargetRow {
        address: 0x10,
        frequency: 30,
    })?;
    driver.set_active_count(1)?;

    let summary = driver.run()?;
    assert_eq!(summary.baseline_errors, 0);
    assert_eq!(summary.flip_errors, 0);
    Ok(())
}

#[test]
fn test_register_level_protocol() {
    init_logging();
    let geometry = PortGeometry::new(6, 1, 2);
    let mut port = SimPort::new(geometry);
    let mut refresh = SimRefresh::default();
    let mut tester = RowHammerTester::new(geometry);

    // pattern SET by hand: raise start, wait for the acknowledge, release
    {
        let regs = tester.registers_mut();
        regs.pattern_select = 0;
        regs.pattern_value = 0x12345678;
        regs.pattern_set_not_get = true;
        regs.pattern_start = true;
    }
    for _ in 0..1000 {
        tester.step(&mut port, &mut refresh);
        port.tick();
        if tester.registers().pattern_ack {
            break;
        }
    }
    assert!(tester.registers().pattern_ack);
    tester.registers_mut().pattern_start = false;
    tester.step(&mut port, &mut refresh);
    assert!(!tester.registers().pattern_ack);

    // GET mirrors the low chunk back
    {
        let regs = tester.registers_mut();
        regs.pattern_set_not_get = false;
        regs.pattern_start = true;
    }
    for _ in 0..1000 {
        tester.step(&mut port, &mut refresh);
        port.tick();
        if tester.registers().pattern_ack {
            break;
        }
    }
    assert_eq!(tester.registers().pattern_out, 0x12345678);
    assert_eq!(tester.registers().phase(), feedback::IDLE);
}
