//! Gekko integer instruction decoder.
//!
//! Decodes a 32-bit big-endian instruction word into [`Insn`]. The
//! translator, the reference interpreter and the disassembler all work
//! from the decoded form, so they agree on field extraction.

use ppc_core::MemOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Addc,
    Adde,
    Subf,
    Subfc,
    Subfe,
    Mullw,
    Mulhw,
    Mulhwu,
    Divw,
    Divwu,
}

/// `rD = op(rA)` forms of the XO group that read XER.CA or negate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithUnaryOp {
    Addme,
    Addze,
    Subfme,
    Subfze,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Andc,
    Or,
    Orc,
    Xor,
    Nor,
    Nand,
    Eqv,
    Slw,
    Srw,
    Sraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicImmOp {
    Ori,
    Oris,
    Xori,
    Xoris,
    /// `andi.`: always records CR0.
    Andi,
    /// `andis.`: always records CR0.
    Andis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Cntlzw,
    Extsb,
    Extsh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrOp {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Eqv,
    Andc,
    Orc,
}

/// Effective-address form of a load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ea {
    /// `(rA|0) + d`
    Disp(i16),
    /// `(rA|0) + rB`
    Indexed(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insn {
    Addi { rd: u8, ra: u8, simm: i16 },
    Addis { rd: u8, ra: u8, simm: i16 },
    /// `addic` / `addic.`
    Addic { rd: u8, ra: u8, simm: i16, rc: bool },
    Subfic { rd: u8, ra: u8, simm: i16 },
    Mulli { rd: u8, ra: u8, simm: i16 },
    Cmpi { crf: u8, ra: u8, simm: i16 },
    Cmpli { crf: u8, ra: u8, uimm: u16 },
    Cmp { crf: u8, ra: u8, rb: u8 },
    Cmpl { crf: u8, ra: u8, rb: u8 },
    LogicImm { op: LogicImmOp, ra: u8, rs: u8, uimm: u16 },
    Arith { op: ArithOp, rd: u8, ra: u8, rb: u8, rc: bool },
    ArithUnary { op: ArithUnaryOp, rd: u8, ra: u8, rc: bool },
    Logic { op: LogicOp, ra: u8, rs: u8, rb: u8, rc: bool },
    Unary { op: UnaryOp, ra: u8, rs: u8, rc: bool },
    Srawi { ra: u8, rs: u8, sh: u8, rc: bool },
    Rlwinm { ra: u8, rs: u8, sh: u8, mb: u8, me: u8, rc: bool },
    Rlwnm { ra: u8, rs: u8, rb: u8, mb: u8, me: u8, rc: bool },
    Rlwimi { ra: u8, rs: u8, sh: u8, mb: u8, me: u8, rc: bool },
    Load { op: MemOp, rd: u8, ra: u8, ea: Ea, update: bool },
    Store { op: MemOp, rs: u8, ra: u8, ea: Ea, update: bool },
    Lmw { rd: u8, ra: u8, d: i16 },
    Stmw { rs: u8, ra: u8, d: i16 },
    B { li: i32, aa: bool, lk: bool },
    Bc { bo: u8, bi: u8, bd: i16, aa: bool, lk: bool },
    Bclr { bo: u8, bi: u8, lk: bool },
    Bcctr { bo: u8, bi: u8, lk: bool },
    CrLogic { op: CrOp, bt: u8, ba: u8, bb: u8 },
    Mcrf { crfd: u8, crfs: u8 },
    Mfspr { rd: u8, spr: u16 },
    Mtspr { rs: u8, spr: u16 },
    Mfmsr { rd: u8 },
    Mtmsr { rs: u8 },
    Mfcr { rd: u8 },
    Mtcrf { rs: u8, crm: u8 },
    Sc,
    Rfi,
    Icbi { ra: u8, rb: u8 },
    Dcbz { ra: u8, rb: u8 },
    /// Cache hints and barriers with no architectural effect here.
    Nop,
    Illegal(u32),
}

// -- Field extraction --

#[inline]
fn rd(w: u32) -> u8 {
    ((w >> 21) & 31) as u8
}

#[inline]
fn ra(w: u32) -> u8 {
    ((w >> 16) & 31) as u8
}

#[inline]
fn rb(w: u32) -> u8 {
    ((w >> 11) & 31) as u8
}

#[inline]
fn simm(w: u32) -> i16 {
    w as u16 as i16
}

#[inline]
fn uimm(w: u32) -> u16 {
    w as u16
}

#[inline]
fn rc(w: u32) -> bool {
    w & 1 != 0
}

#[inline]
fn crfd(w: u32) -> u8 {
    ((w >> 23) & 7) as u8
}

/// SPR number with its two 5-bit halves swapped back.
#[inline]
pub fn spr_field(w: u32) -> u16 {
    (((w >> 16) & 0x1F) | (((w >> 11) & 0x1F) << 5)) as u16
}

/// Sign-extended 26-bit branch displacement.
#[inline]
fn li(w: u32) -> i32 {
    ((w & 0x03FF_FFFC) << 6) as i32 >> 6
}

impl Insn {
    pub fn decode(w: u32) -> Insn {
        let illegal = Insn::Illegal(w);
        match w >> 26 {
            7 => Insn::Mulli { rd: rd(w), ra: ra(w), simm: simm(w) },
            8 => Insn::Subfic { rd: rd(w), ra: ra(w), simm: simm(w) },
            10 | 11 if w & (1 << 22) != 0 || w & (1 << 21) != 0 => illegal,
            10 => Insn::Cmpli { crf: crfd(w), ra: ra(w), uimm: uimm(w) },
            11 => Insn::Cmpi { crf: crfd(w), ra: ra(w), simm: simm(w) },
            12 => Insn::Addic { rd: rd(w), ra: ra(w), simm: simm(w), rc: false },
            13 => Insn::Addic { rd: rd(w), ra: ra(w), simm: simm(w), rc: true },
            14 => Insn::Addi { rd: rd(w), ra: ra(w), simm: simm(w) },
            15 => Insn::Addis { rd: rd(w), ra: ra(w), simm: simm(w) },
            16 => Insn::Bc {
                bo: rd(w),
                bi: ra(w),
                bd: (w & 0xFFFC) as u16 as i16,
                aa: w & 2 != 0,
                lk: w & 1 != 0,
            },
            17 if w & 2 != 0 => Insn::Sc,
            18 => Insn::B {
                li: li(w),
                aa: w & 2 != 0,
                lk: w & 1 != 0,
            },
            19 => decode_op19(w),
            20 => Insn::Rlwimi {
                ra: ra(w),
                rs: rd(w),
                sh: rb(w),
                mb: ((w >> 6) & 31) as u8,
                me: ((w >> 1) & 31) as u8,
                rc: rc(w),
            },
            21 => Insn::Rlwinm {
                ra: ra(w),
                rs: rd(w),
                sh: rb(w),
                mb: ((w >> 6) & 31) as u8,
                me: ((w >> 1) & 31) as u8,
                rc: rc(w),
            },
            23 => Insn::Rlwnm {
                ra: ra(w),
                rs: rd(w),
                rb: rb(w),
                mb: ((w >> 6) & 31) as u8,
                me: ((w >> 1) & 31) as u8,
                rc: rc(w),
            },
            24..=29 => {
                let op = match w >> 26 {
                    24 => LogicImmOp::Ori,
                    25 => LogicImmOp::Oris,
                    26 => LogicImmOp::Xori,
                    27 => LogicImmOp::Xoris,
                    28 => LogicImmOp::Andi,
                    _ => LogicImmOp::Andis,
                };
                Insn::LogicImm { op, ra: ra(w), rs: rd(w), uimm: uimm(w) }
            }
            31 => decode_op31(w),
            32..=45 => {
                let (op, store) = match (w >> 26) & !1 {
                    32 => (MemOp::U32, false),
                    34 => (MemOp::U8, false),
                    36 => (MemOp::U32, true),
                    38 => (MemOp::U8, true),
                    40 => (MemOp::U16, false),
                    42 => (MemOp::S16, false),
                    _ => (MemOp::U16, true),
                };
                let update = (w >> 26) & 1 != 0;
                mem_insn(w, op, store, Ea::Disp(simm(w)), update)
            }
            46 => Insn::Lmw { rd: rd(w), ra: ra(w), d: simm(w) },
            47 => Insn::Stmw { rs: rd(w), ra: ra(w), d: simm(w) },
            _ => illegal,
        }
    }

    /// Downcount cost of the instruction in cycles.
    pub fn cost(&self) -> u32 {
        match self {
            Insn::Mulli { .. } => 3,
            Insn::Arith {
                op: ArithOp::Mullw | ArithOp::Mulhw | ArithOp::Mulhwu,
                ..
            } => 5,
            Insn::Arith {
                op: ArithOp::Divw | ArithOp::Divwu,
                ..
            } => 40,
            _ => 1,
        }
    }
}

fn mem_insn(w: u32, op: MemOp, store: bool, ea: Ea, update: bool) -> Insn {
    let (rd, ra) = (rd(w), ra(w));
    // Update forms need a base register; loads must not target it.
    if update && (ra == 0 || (!store && ra == rd)) {
        return Insn::Illegal(w);
    }
    if store {
        Insn::Store { op, rs: rd, ra, ea, update }
    } else {
        Insn::Load { op, rd, ra, ea, update }
    }
}

fn decode_op19(w: u32) -> Insn {
    let xo = (w >> 1) & 0x3FF;
    let (bt, ba, bb) = (rd(w), ra(w), rb(w));
    let cr = |op| Insn::CrLogic { op, bt, ba, bb };
    match xo {
        0 => Insn::Mcrf {
            crfd: crfd(w),
            crfs: ((w >> 18) & 7) as u8,
        },
        16 => Insn::Bclr { bo: bt, bi: ba, lk: w & 1 != 0 },
        // bcctr with the decrement option is an invalid form.
        528 if bt & 4 == 0 => Insn::Illegal(w),
        528 => Insn::Bcctr { bo: bt, bi: ba, lk: w & 1 != 0 },
        50 => Insn::Rfi,
        150 => Insn::Nop,
        33 => cr(CrOp::Nor),
        129 => cr(CrOp::Andc),
        193 => cr(CrOp::Xor),
        225 => cr(CrOp::Nand),
        257 => cr(CrOp::And),
        289 => cr(CrOp::Eqv),
        417 => cr(CrOp::Orc),
        449 => cr(CrOp::Or),
        _ => Insn::Illegal(w),
    }
}

fn decode_op31(w: u32) -> Insn {
    let (d, a, b, rc) = (rd(w), ra(w), rb(w), rc(w));
    let xo = (w >> 1) & 0x3FF;

    // XO-form arithmetic. The OE forms are not supported.
    let arith = match xo & 0x1FF {
        266 => Some(ArithOp::Add),
        10 => Some(ArithOp::Addc),
        138 => Some(ArithOp::Adde),
        40 => Some(ArithOp::Subf),
        8 => Some(ArithOp::Subfc),
        136 => Some(ArithOp::Subfe),
        235 => Some(ArithOp::Mullw),
        75 => Some(ArithOp::Mulhw),
        11 => Some(ArithOp::Mulhwu),
        491 => Some(ArithOp::Divw),
        459 => Some(ArithOp::Divwu),
        _ => None,
    };
    if let Some(op) = arith {
        if xo & 0x200 != 0 {
            return Insn::Illegal(w);
        }
        return Insn::Arith { op, rd: d, ra: a, rb: b, rc };
    }
    let unary = match xo & 0x1FF {
        234 => Some(ArithUnaryOp::Addme),
        202 => Some(ArithUnaryOp::Addze),
        232 => Some(ArithUnaryOp::Subfme),
        200 => Some(ArithUnaryOp::Subfze),
        104 => Some(ArithUnaryOp::Neg),
        _ => None,
    };
    if let Some(op) = unary {
        if xo & 0x200 != 0 || b != 0 {
            return Insn::Illegal(w);
        }
        return Insn::ArithUnary { op, rd: d, ra: a, rc };
    }

    let logic = |op| Insn::Logic { op, ra: a, rs: d, rb: b, rc };
    let load = |op, update| mem_insn(w, op, false, Ea::Indexed(b), update);
    let store = |op, update| mem_insn(w, op, true, Ea::Indexed(b), update);

    match xo {
        0 | 32 if w & (1 << 22) != 0 || w & (1 << 21) != 0 => Insn::Illegal(w),
        0 => Insn::Cmp { crf: crfd(w), ra: a, rb: b },
        32 => Insn::Cmpl { crf: crfd(w), ra: a, rb: b },

        28 => logic(LogicOp::And),
        60 => logic(LogicOp::Andc),
        444 => logic(LogicOp::Or),
        412 => logic(LogicOp::Orc),
        316 => logic(LogicOp::Xor),
        124 => logic(LogicOp::Nor),
        476 => logic(LogicOp::Nand),
        284 => logic(LogicOp::Eqv),
        24 => logic(LogicOp::Slw),
        536 => logic(LogicOp::Srw),
        792 => logic(LogicOp::Sraw),
        824 => Insn::Srawi { ra: a, rs: d, sh: b, rc },
        26 => Insn::Unary { op: UnaryOp::Cntlzw, ra: a, rs: d, rc },
        954 => Insn::Unary { op: UnaryOp::Extsb, ra: a, rs: d, rc },
        922 => Insn::Unary { op: UnaryOp::Extsh, ra: a, rs: d, rc },

        23 => load(MemOp::U32, false),
        55 => load(MemOp::U32, true),
        87 => load(MemOp::U8, false),
        119 => load(MemOp::U8, true),
        279 => load(MemOp::U16, false),
        311 => load(MemOp::U16, true),
        343 => load(MemOp::S16, false),
        375 => load(MemOp::S16, true),
        151 => store(MemOp::U32, false),
        183 => store(MemOp::U32, true),
        215 => store(MemOp::U8, false),
        247 => store(MemOp::U8, true),
        407 => store(MemOp::U16, false),
        439 => store(MemOp::U16, true),

        339 => Insn::Mfspr { rd: d, spr: spr_field(w) },
        467 => Insn::Mtspr { rs: d, spr: spr_field(w) },
        83 => Insn::Mfmsr { rd: d },
        146 => Insn::Mtmsr { rs: d },
        19 => Insn::Mfcr { rd: d },
        144 => Insn::Mtcrf {
            rs: d,
            crm: ((w >> 12) & 0xFF) as u8,
        },

        982 => Insn::Icbi { ra: a, rb: b },
        1014 => Insn::Dcbz { ra: a, rb: b },
        // dcbst, dcbf, dcbtst, dcbt, dcbi, sync, eieio
        54 | 86 | 246 | 278 | 470 | 598 | 854 => Insn::Nop,
        _ => Insn::Illegal(w),
    }
}

/// Mask for `rlw*` with begin `mb` and end `me`, wrapping when `mb > me`.
pub fn rotate_mask(mb: u32, me: u32) -> u32 {
    let begin = u32::MAX >> mb;
    let end = u32::MAX << (31 - me);
    if mb <= me {
        begin & end
    } else {
        begin | end
    }
}

/// CR mask selected by the `mtcrf` field mask.
pub fn crm_mask(crm: u8) -> u32 {
    (0..8u32)
        .filter(|i| crm & (0x80 >> i) != 0)
        .fold(0, |m, i| m | (0xF000_0000 >> (i * 4)))
}
