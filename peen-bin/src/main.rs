use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use peen_core::pattern::Word;
use peen_core::{HostDriver, PortGeometry, RowHammerTester, RunSummary, TargetRow};
use peen_sim::{Backpressure, SimPort, SimRefresh};
use serde::Serialize;

/// CLI arguments for the `peen-bin` binary.
///
/// Drives a full test run against the simulated memory port: fill, baseline
/// verify, hammer, flip detection and error replay.
#[derive(Debug, Parser, Serialize, Clone)]
struct CliArgs {
    /// Total port address width in bits.
    #[clap(long = "address-bits", default_value = "14")]
    address_bits: u32,
    /// Bank bits within an address.
    #[clap(long = "bank-bits", default_value = "2")]
    bank_bits: u32,
    /// Column bits within an address.
    #[clap(long = "col-bits", default_value = "4")]
    col_bits: u32,
    /// First fill pattern, 32-bit, hex accepted.
    #[clap(long = "pattern", default_value = "0xA5A5A5A5")]
    pattern: String,
    /// Second fill pattern, used with --double-pattern.
    #[clap(long = "pattern2", default_value = "0x5A5A5A5A")]
    pattern2: String,
    /// Alternate between the two patterns at row granularity.
    #[clap(long = "double-pattern")]
    double_pattern: bool,
    /// Target rows to hammer, as addr:frequency pairs (hex addresses
    /// accepted). Defaults to two adjacent rows when omitted.
    #[clap(long = "target")]
    targets: Vec<String>,
    /// Revisit counts for the target slot pairs.
    #[clap(long = "pair-repeat")]
    pair_repeats: Vec<u32>,
    /// How many times the whole ordered row visit repeats.
    #[clap(long = "cycle-repeat", default_value = "1")]
    cycle_repeat: u32,
    /// Refresh interval during the hammer phase (0 = leave untouched).
    #[clap(long = "refresh-interval", default_value = "0")]
    refresh_interval: u32,
    /// Disable refresh entirely while hammering.
    #[clap(long = "no-refresh")]
    no_refresh: bool,
    /// Close rows with auto-precharge while hammering.
    #[clap(long = "auto-precharge")]
    auto_precharge: bool,
    /// Read latency of the simulated port in ticks.
    #[clap(long = "read-latency", default_value = "4")]
    read_latency: u32,
    /// Chance per tick that a simulated channel refuses, in percent.
    #[clap(long = "deny-percent", default_value = "0")]
    deny_percent: u8,
    /// Seed for the simulated backpressure.
    #[clap(long = "seed", default_value = "0")]
    seed: u64,
    /// Weak cells to plant, as victim:bit:aggressor_row:threshold.
    #[clap(long = "weak-cell")]
    weak_cells: Vec<String>,
    /// Repeat the run this many times.
    #[clap(long = "repeat", default_value = "1")]
    repeat: u64,
    /// Output file for run summaries (JSON format).
    #[clap(long = "output")]
    output: Option<String>,
}

#[derive(Serialize)]
struct Results {
    args: CliArgs,
    runs: Vec<RunSummary>,
}

fn parse_u32(s: &str) -> Result<u32> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.with_context(|| format!("invalid number: {}", s))
}

fn parse_u64(s: &str) -> Result<u64> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.with_context(|| format!("invalid number: {}", s))
}

fn parse_target(s: &str) -> Result<TargetRow> {
    let Some((address, frequency)) = s.split_once(':') else {
        bail!("target must be addr:frequency, got {}", s);
    };
    Ok(TargetRow {
        address: parse_u32(address)?,
        frequency: parse_u32(frequency)?,
    })
}

fn plant_weak_cells(port: &mut SimPort, specs: &[String]) -> Result<()> {
    for spec in specs {
        let parts: Vec<&str> = spec.split(':').collect();
        let [victim, bit, row, threshold] = parts.as_slice() else {
            bail!(
                "weak cell must be victim:bit:aggressor_row:threshold, got {}",
                spec
            );
        };
        let bit = parse_u32(bit)?;
        if bit >= Word::BITS {
            bail!("weak cell bit {} exceeds word width", bit);
        }
        port.weaken(
            parse_u32(victim)?,
            1 << bit,
            parse_u32(row)?,
            parse_u64(threshold)?,
        );
    }
    Ok(())
}

fn run(args: &CliArgs) -> Result<Results> {
    let geometry = PortGeometry::new(args.address_bits, args.bank_bits, args.col_bits);
    let backpressure = if args.deny_percent == 0 {
        Backpressure::None
    } else {
        Backpressure::Random {
            deny_percent: args.deny_percent,
        }
    };
    let mut port = SimPort::with_options(geometry, args.read_latency, backpressure, args.seed);
    let mut refresh = SimRefresh::default();
    plant_weak_cells(&mut port, &args.weak_cells)?;

    let mut tester = RowHammerTester::new(geometry);
    let mut driver = HostDriver::new(&mut tester, &mut port, &mut refresh);

    driver.set_pattern(0, parse_u32(&args.pattern)?)?;
    driver.set_pattern(1, parse_u32(&args.pattern2)?)?;
    driver.set_double_pattern(args.double_pattern);
    let targets: Vec<TargetRow> = if args.targets.is_empty() {
        vec![
            TargetRow {
                address: 0x100,
                frequency: 100,
            },
            TargetRow {
                address: 0x140,
                frequency: 100,
            },
        ]
    } else {
        args.targets
            .iter()
            .map(|spec| parse_target(spec))
            .collect::<Result<_>>()?
    };
    for (slot, &row) in targets.iter().enumerate() {
        driver.set_target_row(slot as u32, row)?;
    }
    driver.set_active_count(targets.len() as u32)?;
    for (pair, &count) in args.pair_repeats.iter().enumerate() {
        driver.set_pair_repeat(pair as u32, count)?;
    }
    driver.set_cycle_repeat(args.cycle_repeat)?;
    driver.set_refresh(!args.no_refresh, args.refresh_interval, args.auto_precharge);

    let progress = ProgressBar::new(args.repeat);
    progress.set_style(ProgressStyle::default_bar());
    let mut runs = Vec::new();
    for rep in 1..=args.repeat {
        progress.set_position(rep);
        let summary = driver.run()?;
        info!(
            "run {}/{}: {} baseline error(s), {} flip(s) in {} ticks",
            rep, args.repeat, summary.baseline_errors, summary.flip_errors, summary.ticks
        );
        for error in &summary.errors {
            info!(
                "  {} flip at {:#x} (row {}, bank {}, col {}): {:08x?}",
                if error.before_hammer {
                    "baseline"
                } else {
                    "hammer"
                },
                error.address,
                error.row,
                error.bank,
                error.col,
                error.data
            );
        }
        runs.push(summary);
    }
    progress.finish_and_clear();

    Ok(Results {
        args: args.clone(),
        runs,
    })
}

fn main() -> Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    info!("CLI args: {:?}", args);

    let results = run(&args)?;

    let flips: usize = results.runs.iter().map(|r| r.errors.len()).sum();
    if flips == 0 {
        warn!("no bit flips observed");
    }
    info!(
        "{} run(s) complete, {} error report(s) total",
        results.runs.len(),
        flips
    );

    match &args.output {
        Some(output) => {
            let file = File::create(output)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &results)?;
            writer.flush()?;
            info!("Results saved to {}", output);
        }
        None => println!("{}", serde_json::to_string_pretty(&results)?),
    }

    Ok(())
}
