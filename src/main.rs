use std::path::PathBuf;

use clap::Parser;

use rv32_vp::platform::{Platform, PlatformConfig, RunExit, RAM_BASE};
use rv32_vp::snapshot::Snapshot;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Kernel image to load (ELF or raw binary)
    #[arg(short, long)]
    kernel: PathBuf,

    /// Load address for raw binaries (ELF images carry their own)
    #[arg(long, default_value_t = RAM_BASE)]
    load_addr: u32,

    /// RAM size in MiB
    #[arg(long, default_value_t = 128)]
    ram_mib: usize,

    /// Stop after this many instructions
    #[arg(long)]
    max_insns: Option<u64>,

    /// Keep running through EBREAK instead of stopping
    #[arg(long)]
    no_stop_on_ebreak: bool,

    /// Write a snapshot of the final state to this path
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let ram_size = args
        .ram_mib
        .checked_mul(1024 * 1024)
        .ok_or("requested RAM size is too large")?;

    let config = PlatformConfig {
        ram_size,
        reset_pc: RAM_BASE,
        stop_on_ebreak: !args.no_stop_on_ebreak,
    };
    let mut platform = Platform::new(&config);

    let image = std::fs::read(&args.kernel)?;
    let entry = platform.load_kernel(&image, args.load_addr)?;
    println!("starting execution at {entry:#010x}");

    let exit = platform.run(args.max_insns.unwrap_or(u64::MAX));
    let insns = platform.iss.insn_count;
    match exit {
        RunExit::Break => println!("stopped at EBREAK after {insns} instructions"),
        RunExit::Tohost(code) => {
            // HTIF convention: 1 means pass, odd values encode a failing
            // test number in the upper bits.
            if code == 1 {
                println!("tohost reports PASS after {insns} instructions");
            } else {
                println!(
                    "tohost reports FAIL (code {}, raw {code:#010x}) after {insns} instructions",
                    code >> 1
                );
            }
        }
        RunExit::StepLimit => println!("instruction limit reached after {insns} instructions"),
    }

    let cpu = &platform.iss.cpu;
    println!(
        "final state: pc={:#010x} mode={:?} a0={:#010x} mcause={:#010x} mepc={:#010x}",
        cpu.pc, cpu.mode, cpu.read_reg(10), cpu.csr.mcause, cpu.csr.mepc
    );

    if let Some(path) = &args.snapshot_out {
        Snapshot::capture(&platform).save_to_path(path)?;
        println!("snapshot written to {}", path.display());
    }

    match exit {
        RunExit::Tohost(code) if code != 1 => std::process::exit(1),
        _ => Ok(()),
    }
}
