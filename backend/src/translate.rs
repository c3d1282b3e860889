use ppc_core::{Context, Opcode};
use tracing::trace;

use crate::code_buffer::{CodeBuffer, CodeBufferFull};
use crate::optimize::optimize;
use crate::HostCodeGen;

/// Full translation pipeline: optimize -> lower.
///
/// Returns the offset where the block's code starts. On failure the
/// buffer is rolled back to where it was, so a partial block never
/// becomes reachable.
pub fn translate(
    ctx: &mut Context,
    backend: &mut impl HostCodeGen,
    buf: &mut CodeBuffer,
) -> Result<usize, CodeBufferFull> {
    optimize(ctx);
    let start = buf.offset();
    if let Err(e) = lower(ctx, backend, buf) {
        trace!(start, used = buf.offset(), "code buffer full, rolling back");
        buf.set_offset(start);
        return Err(e);
    }
    Ok(start)
}

fn lower(ctx: &mut Context, backend: &mut impl HostCodeGen, buf: &mut CodeBuffer) -> Result<(), CodeBufferFull> {
    backend.emit_prologue(buf, ctx)?;

    for oi in 0..ctx.num_ops() {
        let op = ctx.ops()[oi].clone();
        match op.opc {
            Opcode::Nop => {}
            Opcode::SetLabel => {
                let here = buf.offset();
                for at in ctx.label_mut(op.carg(0)).resolve(here) {
                    backend.patch_jump(buf, at, here);
                }
            }
            Opcode::Br | Opcode::BrCond => {
                let id = if op.opc == Opcode::Br { op.carg(0) } else { op.carg(1) };
                let at = backend.emit_op(buf, ctx, &op)?;
                let label = ctx.label_mut(id);
                if label.offset.is_none() {
                    label.pending.push(at);
                }
            }
            _ => {
                backend.emit_op(buf, ctx, &op)?;
            }
        }
    }

    debug_assert!(
        !ctx.labels().iter().any(|l| l.is_dangling()),
        "branch to a label that was never set"
    );
    Ok(())
}
