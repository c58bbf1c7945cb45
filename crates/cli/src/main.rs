// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sim68k_config::BoardDescriptor;
use sim68k_core::cpu::M68k;
use sim68k_core::{system, DebugControl, Machine, StopReason};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::{error, info};

const EXIT_PASS: u8 = 0;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_HALTED: u8 = 3;

fn parse_u32_addr(s: &str) -> Result<u32, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_prefix('$'))
    {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex address '{}': {}", s, e))
    } else {
        u32::from_str(trimmed).map_err(|e| format!("Invalid address '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Motorola 68000/CPU32 simulator", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load an S-record image, reset and run it.
    Run(RunArgs),

    /// Print the register file of a board after reset.
    Regs(RegsArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the program image (Motorola S-records)
    #[arg(short, long)]
    image: PathBuf,

    /// Path to the board descriptor (YAML). Defaults to a 68000 with 16 MiB of RAM.
    #[arg(short, long)]
    system: Option<PathBuf>,

    /// Stop after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,

    /// Breakpoint PC address (repeatable)
    #[arg(long, value_parser = parse_u32_addr)]
    breakpoint: Vec<u32>,

    /// Print one trace line per executed instruction and log at debug level
    #[arg(short, long)]
    trace: bool,

    /// Write a machine snapshot (JSON) when the run stops
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RegsArgs {
    /// Path to the board descriptor (YAML)
    #[arg(short, long)]
    system: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let debug = cli.verbose || matches!(&cli.command, Commands::Run(args) if args.trace);
    if debug {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Regs(args) => regs(args),
    }
}

fn load_board(path: Option<&Path>) -> anyhow::Result<BoardDescriptor> {
    match path {
        Some(path) => BoardDescriptor::from_file(path),
        None => Ok(BoardDescriptor::default_68000()),
    }
}

fn prepare(args: &RunArgs) -> anyhow::Result<M68k> {
    let board = load_board(args.system.as_deref())?;
    let mut cpu = system::build_cpu(&board)?;
    let image = sim68k_loader::load_srecord(&args.image)?;
    cpu.load_image(&image).context("Failed to load program image")?;
    cpu.reset();
    Ok(cpu)
}

fn run(args: RunArgs) -> ExitCode {
    let cpu = match prepare(&args) {
        Ok(cpu) => cpu,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut machine = Machine::new(cpu);
    machine.set_tracing(args.trace);
    for addr in &args.breakpoint {
        machine.add_breakpoint(*addr);
    }

    info!("Running from PC {:#010x}", machine.pc());
    let reason = match machine.run(args.max_steps) {
        Ok(reason) => reason,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    for record in machine.take_trace() {
        println!("{}", record);
    }
    println!("Stopped: {} after {} steps", reason, machine.step_count());
    print_registers(&machine.cpu);
    for (label, value) in machine.cpu.statistics().rows() {
        println!("{:<24} {}", label, value);
    }

    if let Some(path) = &args.snapshot {
        if let Err(e) = write_snapshot(path, &machine) {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    }

    match reason {
        StopReason::Halted => ExitCode::from(EXIT_HALTED),
        _ => ExitCode::from(EXIT_PASS),
    }
}

fn regs(args: RegsArgs) -> ExitCode {
    let cpu = load_board(args.system.as_deref()).and_then(|board| system::build_cpu(&board));
    match cpu {
        Ok(cpu) => {
            print_registers(&cpu);
            ExitCode::from(EXIT_PASS)
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn print_registers(cpu: &M68k) {
    for reg in cpu.register_info() {
        println!("{:<4} {:>8}  {}", reg.name, reg.value, reg.description);
    }
}

fn write_snapshot(path: &Path, machine: &Machine<M68k>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create snapshot parent dir {:?}", parent))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create snapshot {:?}", path))?;
    serde_json::to_writer_pretty(file, &machine.snapshot())
        .with_context(|| format!("Failed to write snapshot {:?}", path))?;
    info!("Snapshot written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u32_addr() {
        assert_eq!(parse_u32_addr("0x400"), Ok(0x400));
        assert_eq!(parse_u32_addr("$1F"), Ok(0x1f));
        assert_eq!(parse_u32_addr(" 1024 "), Ok(1024));
        assert!(parse_u32_addr("0xzz").is_err());
    }

    #[test]
    fn test_cli_shape() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
