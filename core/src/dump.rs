//! IR dump: human-readable text output for a translated block.

use std::fmt::Write as _;
use std::io::Write;

use crate::context::Context;
use crate::opcode::Opcode;
use crate::temp::{TempIdx, TempKind};
use crate::types::{Cond, ExitKind, MemOp};

fn fmt_temp(ctx: &Context, idx: TempIdx, buf: &mut String) {
    let i = idx.0 as usize;
    if i >= ctx.nb_temps() as usize {
        let _ = write!(buf, "?{i}");
        return;
    }
    let t = ctx.temp(idx);
    match t.kind {
        TempKind::Const => {
            let _ = write!(buf, "$0x{:x}", t.val);
        }
        TempKind::Global => match t.reg {
            Some(reg) => {
                let _ = write!(buf, "{reg}");
            }
            None => {
                let _ = write!(buf, "g{i}");
            }
        },
        TempKind::Ebb => {
            let local = i as u32 - ctx.nb_globals();
            let _ = write!(buf, "tmp{local}");
        }
    }
}

/// Dump all IR ops in `ctx` to the given writer.
pub fn dump_ops(ctx: &Context, w: &mut impl Write) -> std::io::Result<()> {
    dump_ops_with(ctx, w, |_, _| Ok(()))
}

/// Dump IR ops with an annotation callback for `InsnStart`.
///
/// `insn_anno` is called at each guest instruction boundary with
/// `(pc, writer)`, e.g. to print the disassembly on the
/// `---- 0x...` header line.
pub fn dump_ops_with(
    ctx: &Context,
    w: &mut impl Write,
    insn_anno: impl Fn(u32, &mut dyn Write) -> std::io::Result<()>,
) -> std::io::Result<()> {
    let mut buf = String::with_capacity(64);

    for op in ctx.ops() {
        match op.opc {
            Opcode::InsnStart => {
                let pc = op.carg(0);
                write!(w, " ---- 0x{pc:08x}")?;
                insn_anno(pc, w)?;
                writeln!(w)?;
                writeln!(w, " insn_start $0x{pc:x}, cost {}", op.carg(1))?;
                continue;
            }
            Opcode::SetLabel => {
                writeln!(w, " L{}:", op.carg(0))?;
                continue;
            }
            _ => {}
        }

        buf.clear();
        buf.push(' ');
        buf.push_str(op.opc.def().name);
        let mut first = true;
        for &a in op.oargs().iter().chain(op.iargs()) {
            buf.push_str(if first { " " } else { ", " });
            first = false;
            fmt_temp(ctx, a, &mut buf);
        }

        match op.opc {
            Opcode::SetCond => {
                let cond = Cond::from_u32(op.carg(0)).map_or("???", Cond::name);
                let _ = write!(buf, ", {cond}");
            }
            Opcode::BrCond => {
                let cond = Cond::from_u32(op.carg(0)).map_or("???", Cond::name);
                let _ = write!(buf, ", {cond}, L{}", op.carg(1));
            }
            Opcode::Br => {
                let _ = write!(buf, " L{}", op.carg(0));
            }
            Opcode::Ld | Opcode::St => {
                let memop = MemOp::from_u32(op.carg(0)).map_or("??", MemOp::name);
                let _ = write!(buf, ", {memop}");
            }
            Opcode::ExitTb => {
                let kind = ExitKind::from_u32(op.carg(0)).map_or("???", ExitKind::name);
                let _ = write!(buf, ", {kind}, cost {}", op.carg(1));
            }
            _ => {
                for &c in op.cargs() {
                    let _ = write!(buf, ", $0x{:x}", c.0);
                }
            }
        }

        writeln!(w, "{buf}")?;
    }
    Ok(())
}
