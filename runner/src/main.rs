//! ppc-run: run a flat big-endian Gekko image on the JIT.
//!
//! The image is copied to physical memory and executed from the boot
//! entry point on a dedicated CPU thread. The main thread can sample
//! the CPU periodically through the thread guard.

mod config;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use clap::Parser;
use ppc_core::CpuState;
use ppc_exec::{run_guarded, CpuThread, Debugger, Dispatcher, ExitReason, HleFunction};
use ppc_memory::Memory;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::RunnerConfig;

fn parse_u32(s: &str) -> Result<u32, String> {
    let r = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    r.map_err(|e| format!("invalid address {s:?}: {e}"))
}

#[derive(Parser, Debug)]
#[command(name = "ppc-run", about = "Run a flat big-endian Gekko image on the JIT.")]
struct Args {
    /// Flat binary image
    image: PathBuf,

    /// TOML file with [jit], [memory] and [boot] tables
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Physical load address of the image
    #[arg(long, value_name = "ADDR", value_parser = parse_u32)]
    load_address: Option<u32>,

    /// Initial PC
    #[arg(long, value_name = "ADDR", value_parser = parse_u32)]
    entry: Option<u32>,

    /// Stop when execution reaches this address (also loaded into LR)
    #[arg(long, value_name = "ADDR", value_parser = parse_u32)]
    exit_address: Option<u32>,

    /// Stop after this many guest cycles
    #[arg(long, value_name = "CYCLES")]
    max_cycles: Option<u64>,

    /// Stop before executing this address (repeatable)
    #[arg(long = "break", value_name = "ADDR", value_parser = parse_u32)]
    breakpoints: Vec<u32>,

    /// Upper bound on guest instructions per block
    #[arg(long, value_name = "N")]
    max_block_insns: Option<u32>,

    /// Skip checksum revalidation of cached blocks
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_icache_check: bool,

    /// Log CPU status every this many milliseconds
    #[arg(long, value_name = "MS")]
    sample_ms: Option<u64>,

    /// Print dispatcher statistics on exit
    #[arg(long, action = clap::ArgAction::SetTrue)]
    stats: bool,
}

impl Args {
    fn apply(&self, cfg: &mut RunnerConfig) {
        if let Some(v) = self.load_address {
            cfg.boot.load_address = v;
        }
        if let Some(v) = self.entry {
            cfg.boot.entry = v;
        }
        if self.exit_address.is_some() {
            cfg.boot.exit_address = self.exit_address;
        }
        if let Some(v) = self.max_block_insns {
            cfg.jit.max_block_insns = v;
        }
        if self.no_icache_check {
            cfg.jit.icache_check = false;
        }
        cfg.jit.extended_ram = cfg.memory.extended_ram;
    }
}

fn print_registers(state: &CpuState) {
    for row in 0..8 {
        let line: Vec<String> = (0..4)
            .map(|col| {
                let r = row * 4 + col;
                format!("r{r:<2} = {:08x}", state.gpr[r])
            })
            .collect();
        println!("{}", line.join("  "));
    }
    println!(
        "pc  = {:08x}  lr  = {:08x}  ctr = {:08x}  xer = {:08x}",
        state.pc,
        state.lr(),
        state.ctr(),
        state.xer()
    );
    println!("cr  = {:08x}  msr = {:08x}", state.cr, state.msr);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    args.apply(&mut cfg);

    let image = fs::read(&args.image)
        .with_context(|| format!("reading image {}", args.image.display()))?;
    let mut mem = Memory::new(&cfg.memory);
    mem.load(cfg.boot.load_address, &image).with_context(|| {
        format!(
            "image of {} bytes does not fit at {:#010x}",
            image.len(),
            cfg.boot.load_address
        )
    })?;

    let mut emu = Dispatcher::new(cfg.jit, Box::new(mem));
    emu.reset(cfg.boot.entry);
    emu.state.msr = cfg.boot.msr;
    emu.state.gpr[1] = cfg.boot.stack_pointer;

    if let Some(addr) = cfg.boot.exit_address {
        emu.register_hle(addr, "exit", HleFunction::Stop);
        emu.state.set_lr(addr);
    }
    if let Some(limit) = args.max_cycles {
        let control = emu.control();
        let timing = emu.scheduler_mut();
        let ty = timing.register_event(
            "cycle_limit",
            Box::new(move |_, _, _, _| control.request_stop()),
        );
        timing.schedule_event(limit, ty, 0);
    }
    if !args.breakpoints.is_empty() {
        let mut debugger = Debugger::new();
        for &addr in &args.breakpoints {
            debugger.breakpoints.add(addr);
        }
        emu.set_debugger(Box::new(debugger));
        emu.set_debugging(true);
    }

    info!(
        image = %args.image.display(),
        entry = format_args!("{:#010x}", cfg.boot.entry),
        "starting"
    );
    let started = Instant::now();
    let cpu = Arc::new(CpuThread::new(emu));
    let worker = {
        let cpu = Arc::clone(&cpu);
        thread::Builder::new()
            .name("cpu".into())
            .spawn(move || run_guarded(&cpu))
            .context("spawning cpu thread")?
    };

    if let Some(ms) = args.sample_ms {
        let period = Duration::from_millis(ms.max(1));
        loop {
            thread::sleep(period);
            if worker.is_finished() {
                break;
            }
            let emu = cpu.pause();
            info!(
                pc = format_args!("{:#010x}", emu.state.pc),
                blocks = emu.stats().blocks_executed,
                cycles = emu.scheduler().ticks(&emu.state),
                "sample"
            );
        }
    }

    let reason = worker
        .join()
        .map_err(|_| anyhow!("cpu thread panicked"))??;
    let elapsed = started.elapsed();
    let emu = Arc::try_unwrap(cpu)
        .map_err(|_| anyhow!("cpu thread still shared"))?
        .into_inner();

    match reason {
        ExitReason::Stopped => println!("stopped at {:#010x}", emu.state.pc),
        ExitReason::Debug(stop) => println!("{stop:?} at {:#010x}", stop.pc()),
    }
    print_registers(&emu.state);
    if args.stats {
        println!("cycles: {}", emu.scheduler().ticks(&emu.state));
        println!("elapsed: {elapsed:.2?}");
        println!("{}", emu.stats());
    }
    Ok(())
}
