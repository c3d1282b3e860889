use std::collections::HashMap;

use crate::label::Label;
use crate::op::{Op, OpIdx};
use crate::temp::{GlobalReg, Temp, TempIdx, TempKind};

/// Default upper bound on guest instructions per block.
pub const MAX_INSNS: usize = 128;

/// Per-thread translation context.
///
/// Holds the temporaries, IR ops and labels of the block currently
/// being translated. Globals are created on first use and survive
/// [`Context::reset`], so repeated translations reuse their indices.
pub struct Context {
    temps: Vec<Temp>,
    ops: Vec<Op>,
    labels: Vec<Label>,
    globals: HashMap<GlobalReg, TempIdx>,
    consts: HashMap<u32, TempIdx>,
    /// Global temps created before the first local.
    nb_globals: u32,
}

impl Context {
    pub fn new() -> Self {
        Self {
            temps: Vec::with_capacity(128),
            ops: Vec::with_capacity(512),
            labels: Vec::with_capacity(16),
            globals: HashMap::new(),
            consts: HashMap::new(),
            nb_globals: 0,
        }
    }

    /// Reset for a new block. Globals keep their indices; locals,
    /// constants, ops and labels are dropped.
    pub fn reset(&mut self) {
        self.temps.truncate(self.nb_globals as usize);
        let nb_globals = self.nb_globals;
        self.globals.retain(|_, idx| idx.0 < nb_globals);
        self.ops.clear();
        self.labels.clear();
        self.consts.clear();
    }

    // -- Temp allocation --

    pub fn nb_globals(&self) -> u32 {
        self.nb_globals
    }

    pub fn nb_temps(&self) -> u32 {
        self.temps.len() as u32
    }

    /// Number of block-local temps, i.e. the frame slots a backend needs.
    pub fn nb_locals(&self) -> u32 {
        self.temps
            .iter()
            .filter(|t| t.kind == TempKind::Ebb)
            .count() as u32
    }

    /// Temp bound to the guest register `reg`.
    ///
    /// A global first requested after locals exist in the current block
    /// is dropped on reset and recreated on next use.
    pub fn global(&mut self, reg: GlobalReg) -> TempIdx {
        if let Some(&idx) = self.globals.get(&reg) {
            return idx;
        }
        let idx = TempIdx(self.temps.len() as u32);
        self.temps.push(Temp::new_global(idx, reg));
        if idx.0 == self.nb_globals {
            self.nb_globals += 1;
        }
        self.globals.insert(reg, idx);
        idx
    }

    /// Allocate a block-local temporary.
    pub fn new_temp(&mut self) -> TempIdx {
        let idx = TempIdx(self.temps.len() as u32);
        self.temps.push(Temp::new_ebb(idx));
        idx
    }

    /// Get or create a constant temp. Deduplicated per block.
    pub fn new_const(&mut self, val: u32) -> TempIdx {
        if let Some(&idx) = self.consts.get(&val) {
            return idx;
        }
        let idx = TempIdx(self.temps.len() as u32);
        self.temps.push(Temp::new_const(idx, val));
        self.consts.insert(val, idx);
        idx
    }

    pub fn temp(&self, idx: TempIdx) -> &Temp {
        &self.temps[idx.0 as usize]
    }

    pub fn temps(&self) -> &[Temp] {
        &self.temps
    }

    // -- Labels --

    pub fn new_label(&mut self) -> u32 {
        let id = self.labels.len() as u32;
        self.labels.push(Label::new(id));
        id
    }

    pub fn label(&self, id: u32) -> &Label {
        &self.labels[id as usize]
    }

    pub fn label_mut(&mut self, id: u32) -> &mut Label {
        &mut self.labels[id as usize]
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    // -- Ops --

    pub fn next_op_idx(&self) -> OpIdx {
        OpIdx(self.ops.len() as u32)
    }

    pub fn emit_op(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    pub fn op(&self, idx: OpIdx) -> &Op {
        &self.ops[idx.0 as usize]
    }

    pub fn op_mut(&mut self, idx: OpIdx) -> &mut Op {
        &mut self.ops[idx.0 as usize]
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
