//! Gekko disassembler for the integer subset the frontend translates.
//!
//! Uses the same decoder as the translator, so anything printed here
//! is exactly what gets compiled. Common simplified mnemonics (`li`,
//! `mr`, `blr`, `mflr`, ...) are used where they apply.

use ppc_core::state::{SPR_CTR, SPR_LR, SPR_XER};
use ppc_core::MemOp;
use ppc_frontend::gekko::insn::{
    ArithOp, ArithUnaryOp, CrOp, Ea, Insn, LogicImmOp, LogicOp, UnaryOp,
};

fn dot(rc: bool) -> &'static str {
    if rc {
        "."
    } else {
        ""
    }
}

fn suffix(aa: bool, lk: bool) -> &'static str {
    match (lk, aa) {
        (false, false) => "",
        (true, false) => "l",
        (false, true) => "a",
        (true, true) => "la",
    }
}

fn branch_target(pc: u32, disp: i32, aa: bool) -> u32 {
    if aa {
        disp as u32
    } else {
        pc.wrapping_add(disp as u32)
    }
}

fn arith_name(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "add",
        ArithOp::Addc => "addc",
        ArithOp::Adde => "adde",
        ArithOp::Subf => "subf",
        ArithOp::Subfc => "subfc",
        ArithOp::Subfe => "subfe",
        ArithOp::Mullw => "mullw",
        ArithOp::Mulhw => "mulhw",
        ArithOp::Mulhwu => "mulhwu",
        ArithOp::Divw => "divw",
        ArithOp::Divwu => "divwu",
    }
}

fn arith_unary_name(op: ArithUnaryOp) -> &'static str {
    match op {
        ArithUnaryOp::Addme => "addme",
        ArithUnaryOp::Addze => "addze",
        ArithUnaryOp::Subfme => "subfme",
        ArithUnaryOp::Subfze => "subfze",
        ArithUnaryOp::Neg => "neg",
    }
}

fn logic_name(op: LogicOp) -> &'static str {
    match op {
        LogicOp::And => "and",
        LogicOp::Andc => "andc",
        LogicOp::Or => "or",
        LogicOp::Orc => "orc",
        LogicOp::Xor => "xor",
        LogicOp::Nor => "nor",
        LogicOp::Nand => "nand",
        LogicOp::Eqv => "eqv",
        LogicOp::Slw => "slw",
        LogicOp::Srw => "srw",
        LogicOp::Sraw => "sraw",
    }
}

fn logic_imm_name(op: LogicImmOp) -> &'static str {
    match op {
        LogicImmOp::Ori => "ori",
        LogicImmOp::Oris => "oris",
        LogicImmOp::Xori => "xori",
        LogicImmOp::Xoris => "xoris",
        LogicImmOp::Andi => "andi.",
        LogicImmOp::Andis => "andis.",
    }
}

fn unary_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Cntlzw => "cntlzw",
        UnaryOp::Extsb => "extsb",
        UnaryOp::Extsh => "extsh",
    }
}

fn cr_name(op: CrOp) -> &'static str {
    match op {
        CrOp::And => "crand",
        CrOp::Or => "cror",
        CrOp::Xor => "crxor",
        CrOp::Nand => "crnand",
        CrOp::Nor => "crnor",
        CrOp::Eqv => "creqv",
        CrOp::Andc => "crandc",
        CrOp::Orc => "crorc",
    }
}

fn mem_name(op: MemOp, store: bool) -> &'static str {
    match (op, store) {
        (MemOp::U8, false) => "lbz",
        (MemOp::U16, false) => "lhz",
        (MemOp::S16, false) => "lha",
        (MemOp::U32, false) => "lwz",
        (MemOp::U8, true) => "stb",
        (MemOp::U16 | MemOp::S16, true) => "sth",
        (MemOp::U32, true) => "stw",
    }
}

fn mem_operands(r: u8, ra: u8, ea: Ea) -> String {
    match ea {
        Ea::Disp(d) => format!("r{r}, {d}(r{ra})"),
        Ea::Indexed(rb) => format!("r{r}, r{ra}, r{rb}"),
    }
}

fn mem_mnemonic(op: MemOp, store: bool, ea: Ea, update: bool) -> String {
    let mut s = mem_name(op, store).to_string();
    if update {
        s.push('u');
    }
    if matches!(ea, Ea::Indexed(_)) {
        s.push('x');
    }
    s
}

fn spr_name(spr: u16) -> Option<&'static str> {
    match spr as usize {
        SPR_XER => Some("xer"),
        SPR_LR => Some("lr"),
        SPR_CTR => Some("ctr"),
        _ => None,
    }
}

/// Conditional branch mnemonic for the common BO encodings, or `None`
/// for the raw `bc` form.
fn cond_branch(bo: u8, bi: u8) -> Option<String> {
    const CONDS: [(&str, &str); 4] = [("lt", "ge"), ("gt", "le"), ("eq", "ne"), ("so", "ns")];
    let (when_set, when_clear) = CONDS[(bi & 3) as usize];
    let crf = bi >> 2;
    let field = if crf == 0 {
        String::new()
    } else {
        format!("cr{crf}")
    };
    let name = match bo & 0x1E {
        0x0C => format!("b{when_set}"),
        0x04 => format!("b{when_clear}"),
        0x14 => return Some("b".into()),
        0x10 => return Some("bdnz".into()),
        0x12 => return Some("bdz".into()),
        _ => return None,
    };
    Some(if field.is_empty() {
        name
    } else {
        format!("{name} {field},")
    })
}

/// Disassemble the big-endian instruction `word` located at `pc`.
pub fn print_insn_gekko(pc: u32, word: u32) -> String {
    match Insn::decode(word) {
        Insn::Addi { rd, ra: 0, simm } => format!("li r{rd}, {simm}"),
        Insn::Addi { rd, ra, simm } => format!("addi r{rd}, r{ra}, {simm}"),
        Insn::Addis { rd, ra: 0, simm } => format!("lis r{rd}, {:#x}", simm as u16),
        Insn::Addis { rd, ra, simm } => format!("addis r{rd}, r{ra}, {:#x}", simm as u16),
        Insn::Addic { rd, ra, simm, rc } => format!("addic{} r{rd}, r{ra}, {simm}", dot(rc)),
        Insn::Subfic { rd, ra, simm } => format!("subfic r{rd}, r{ra}, {simm}"),
        Insn::Mulli { rd, ra, simm } => format!("mulli r{rd}, r{ra}, {simm}"),
        Insn::Cmpi { crf, ra, simm } => format!("cmpwi cr{crf}, r{ra}, {simm}"),
        Insn::Cmpli { crf, ra, uimm } => format!("cmplwi cr{crf}, r{ra}, {uimm}"),
        Insn::Cmp { crf, ra, rb } => format!("cmpw cr{crf}, r{ra}, r{rb}"),
        Insn::Cmpl { crf, ra, rb } => format!("cmplw cr{crf}, r{ra}, r{rb}"),
        Insn::LogicImm {
            op: LogicImmOp::Ori,
            ra: 0,
            rs: 0,
            uimm: 0,
        } => "nop".into(),
        Insn::LogicImm { op, ra, rs, uimm } => {
            format!("{} r{ra}, r{rs}, {uimm:#x}", logic_imm_name(op))
        }
        Insn::Arith { op, rd, ra, rb, rc } => {
            format!("{}{} r{rd}, r{ra}, r{rb}", arith_name(op), dot(rc))
        }
        Insn::ArithUnary { op, rd, ra, rc } => {
            format!("{}{} r{rd}, r{ra}", arith_unary_name(op), dot(rc))
        }
        Insn::Logic {
            op: LogicOp::Or,
            ra,
            rs,
            rb,
            rc,
        } if rs == rb => format!("mr{} r{ra}, r{rs}", dot(rc)),
        Insn::Logic { op, ra, rs, rb, rc } => {
            format!("{}{} r{ra}, r{rs}, r{rb}", logic_name(op), dot(rc))
        }
        Insn::Unary { op, ra, rs, rc } => format!("{}{} r{ra}, r{rs}", unary_name(op), dot(rc)),
        Insn::Srawi { ra, rs, sh, rc } => format!("srawi{} r{ra}, r{rs}, {sh}", dot(rc)),
        Insn::Rlwinm {
            ra,
            rs,
            sh,
            mb,
            me,
            rc,
        } => format!("rlwinm{} r{ra}, r{rs}, {sh}, {mb}, {me}", dot(rc)),
        Insn::Rlwnm {
            ra,
            rs,
            rb,
            mb,
            me,
            rc,
        } => format!("rlwnm{} r{ra}, r{rs}, r{rb}, {mb}, {me}", dot(rc)),
        Insn::Rlwimi {
            ra,
            rs,
            sh,
            mb,
            me,
            rc,
        } => format!("rlwimi{} r{ra}, r{rs}, {sh}, {mb}, {me}", dot(rc)),
        Insn::Load {
            op,
            rd,
            ra,
            ea,
            update,
        } => format!(
            "{} {}",
            mem_mnemonic(op, false, ea, update),
            mem_operands(rd, ra, ea)
        ),
        Insn::Store {
            op,
            rs,
            ra,
            ea,
            update,
        } => format!(
            "{} {}",
            mem_mnemonic(op, true, ea, update),
            mem_operands(rs, ra, ea)
        ),
        Insn::Lmw { rd, ra, d } => format!("lmw r{rd}, {d}(r{ra})"),
        Insn::Stmw { rs, ra, d } => format!("stmw r{rs}, {d}(r{ra})"),
        Insn::B { li, aa, lk } => {
            format!("b{} {:#010x}", suffix(aa, lk), branch_target(pc, li, aa))
        }
        Insn::Bc { bo, bi, bd, aa, lk } => {
            let target = branch_target(pc, bd as i32, aa);
            match cond_branch(bo, bi) {
                Some(name) => format!("{name}{} {target:#010x}", suffix(aa, lk)),
                None => format!("bc{} {bo}, {bi}, {target:#010x}", suffix(aa, lk)),
            }
        }
        Insn::Bclr { bo: 20, lk, .. } => format!("blr{}", suffix(false, lk)),
        Insn::Bclr { bo, bi, lk } => format!("bclr{} {bo}, {bi}", suffix(false, lk)),
        Insn::Bcctr { bo: 20, lk, .. } => format!("bctr{}", suffix(false, lk)),
        Insn::Bcctr { bo, bi, lk } => format!("bcctr{} {bo}, {bi}", suffix(false, lk)),
        Insn::CrLogic { op, bt, ba, bb } => format!("{} {bt}, {ba}, {bb}", cr_name(op)),
        Insn::Mcrf { crfd, crfs } => format!("mcrf cr{crfd}, cr{crfs}"),
        Insn::Mfspr { rd, spr } => match spr_name(spr) {
            Some(name) => format!("mf{name} r{rd}"),
            None => format!("mfspr r{rd}, {spr}"),
        },
        Insn::Mtspr { rs, spr } => match spr_name(spr) {
            Some(name) => format!("mt{name} r{rs}"),
            None => format!("mtspr {spr}, r{rs}"),
        },
        Insn::Mfmsr { rd } => format!("mfmsr r{rd}"),
        Insn::Mtmsr { rs } => format!("mtmsr r{rs}"),
        Insn::Mfcr { rd } => format!("mfcr r{rd}"),
        Insn::Mtcrf { rs, crm } => format!("mtcrf {crm:#x}, r{rs}"),
        Insn::Sc => "sc".into(),
        Insn::Rfi => "rfi".into(),
        Insn::Icbi { ra, rb } => format!("icbi r{ra}, r{rb}"),
        Insn::Dcbz { ra, rb } => format!("dcbz r{ra}, r{rb}"),
        Insn::Nop => "nop".into(),
        Insn::Illegal(w) => format!(".long {w:#010x}"),
    }
}
