//! ppc-blockdump: translate blocks of a flat Gekko image and print them.
//!
//! Each block is shown as guest disassembly interleaved with its IR,
//! optionally followed by the threaded host code it lowers to.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use ppc_backend::translate::translate;
use ppc_backend::{CodeBuffer, ThreadedBackend};
use ppc_core::dump::dump_ops_with;
use ppc_core::state::{MSR_DR, MSR_IR};
use ppc_core::{AddressingMode, Context, MAX_INSNS};
use ppc_disas::print_insn_gekko;
use ppc_frontend::gekko::GekkoFrontend;
use ppc_frontend::{BlockTranslator, NoHooks, TranslateRequest};
use ppc_memory::{GuestMemory, Memory, MemoryConfig};

fn parse_u32(s: &str) -> Result<u32, String> {
    let r = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    r.map_err(|e| format!("invalid address {s:?}: {e}"))
}

#[derive(Parser, Debug)]
#[command(name = "ppc-blockdump", about = "Dump translated blocks of a flat Gekko image.")]
struct Args {
    /// Flat binary image
    image: PathBuf,

    /// Physical load address of the image
    #[arg(long, value_name = "ADDR", value_parser = parse_u32, default_value = "0x3100")]
    load_address: u32,

    /// First block address
    #[arg(long, value_name = "ADDR", value_parser = parse_u32, default_value = "0x80003100")]
    start: u32,

    /// Translate with MSR.IR/DR clear
    #[arg(long, action = clap::ArgAction::SetTrue)]
    real_mode: bool,

    /// Number of consecutive blocks to dump
    #[arg(long, value_name = "N", default_value_t = 1)]
    count: usize,

    /// Max instructions per block
    #[arg(long, value_name = "N", default_value_t = MAX_INSNS as u32)]
    max_insns: u32,

    /// Also print the optimised IR lowered to host code
    #[arg(long, action = clap::ArgAction::SetTrue)]
    host: bool,

    /// Output file (default: stdout)
    #[arg(short, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let image = fs::read(&args.image)
        .with_context(|| format!("reading image {}", args.image.display()))?;
    let mut mem = Memory::new(&MemoryConfig::default());
    mem.load(args.load_address, &image)
        .with_context(|| format!("image does not fit at {:#010x}", args.load_address))?;

    let mode = if args.real_mode {
        AddressingMode::REAL
    } else {
        AddressingMode::from_msr(MSR_IR | MSR_DR)
    };
    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            fs::File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut frontend = GekkoFrontend::new();
    let mut backend = ThreadedBackend::new();
    let mut code = CodeBuffer::new(1 << 16);
    let mut ir = Context::new();
    let mut pc = args.start;

    for n in 0..args.count {
        let req = TranslateRequest {
            pc,
            mode,
            max_insns: args.max_insns,
            hooks: &NoHooks,
        };
        let tb = match frontend.gen_code(&mut ir, &mem, &req) {
            Ok(tb) => tb,
            Err(fault) => {
                writeln!(out, "block #{n} @ {pc:#010x}: {fault}")?;
                break;
            }
        };
        writeln!(
            out,
            "block #{n} @ {pc:#010x}: {} insns, cost {}, checksum {:016x}",
            tb.num_insns, tb.cost, tb.checksum
        )?;
        dump_ops_with(&ir, &mut out, |pc, w| match mem.fetch_insn(pc, mode) {
            Ok(word) => write!(w, "  {word:08x}  {}", print_insn_gekko(pc, word)),
            Err(_) => Ok(()),
        })?;

        if args.host {
            code.reset();
            let start = translate(&mut ir, &mut backend, &mut code)?;
            writeln!(out, " -- host code --")?;
            for (i, insn) in code.slice(start, code.offset() - start).iter().enumerate() {
                writeln!(out, " {:4}: {insn}", start + i)?;
            }
        }
        writeln!(out)?;
        pc = pc.wrapping_add(tb.num_insns * 4);
    }
    out.flush()?;
    Ok(())
}
