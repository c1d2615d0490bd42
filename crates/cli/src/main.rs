//! Command-line driver: loads a ROM image, wires up RDRAM and the VI beacon, and
//! runs the simulator either for a fixed cycle count or until the CPU halts itself.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use n64_core::soc::bus::map;
use n64_core::soc::memory::{Memory, Rom};
use n64_core::{Bus, Config, Cpu, Simulator};

/// A cycle-accurate simulator of the Nintendo 64 main CPU.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a cartridge ROM image (big-endian `.z64`).
    rom: PathBuf,

    /// Optional JSON configuration overriding cache/TLB/timing defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// RDRAM size in bytes.
    #[arg(long, default_value_t = 4 * 1024 * 1024)]
    rdram_size: usize,

    /// Stop after this many cycles instead of running until halted.
    #[arg(long)]
    cycles: Option<u64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("invalid config at {}: {e}", path.display());
                    return ExitCode::FAILURE;
                }
            },
            Err(e) => {
                eprintln!("failed to read {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    let rom_bytes = match std::fs::read(&args.rom) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("failed to read ROM {}: {e}", args.rom.display());
            return ExitCode::FAILURE;
        }
    };

    let mut bus = Bus::new(map::MI_BASE);
    if let Err(e) = bus.add_device(Box::new(Memory::new(map::RDRAM_BASE, args.rdram_size))) {
        eprintln!("failed to register RDRAM: {e}");
        return ExitCode::FAILURE;
    }
    if let Err(e) = bus.add_device(Box::new(Rom::new(map::CART_BASE, rom_bytes))) {
        eprintln!("failed to register cartridge ROM: {e}");
        return ExitCode::FAILURE;
    }

    let cpu = Cpu::reset(config);
    let mut sim = Simulator::new(cpu, bus);

    println!("=========================================================");

    match args.cycles {
        Some(n) => sim.run_cycles(n),
        None => loop {
            if sim.cpu.signals.force_exit {
                break;
            }
            sim.step();
        },
    }

    println!("=========================================================");
    sim.cpu.stats.print();

    ExitCode::SUCCESS
}
