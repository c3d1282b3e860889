use ppc_core::dump::dump_ops;
use ppc_core::icache::{IcacheRegion, EXRAM_BIT, VMEM_BIT};
use ppc_core::state::{MSR_DR, MSR_IR};
use ppc_core::{
    checksum_words, AddressingMode, BlockChecksum, CompiledBlock, Cond, Context, CpuState,
    ExceptionFlags, ExitKind, GlobalReg, ICacheTagTable, IcacheGeometry, MemOp, Opcode, TempKind,
};

// ── Tag table ───────────────────────────────────────────────

#[test]
fn tag_table_insert_lookup_remove() {
    let mut t = ICacheTagTable::new(IcacheGeometry::default(), false);
    assert_eq!(t.lookup(0x8000_3100), None);
    t.insert(0x8000_3100, 7);
    assert_eq!(t.lookup(0x8000_3100), Some(7));
    assert!(!t.remove_if(0x8000_3100, 8));
    assert_eq!(t.lookup(0x8000_3100), Some(7));
    assert!(t.remove_if(0x8000_3100, 7));
    assert_eq!(t.lookup(0x8000_3100), None);
}

#[test]
fn tag_table_aliases_overwrite() {
    let mut t = ICacheTagTable::new(IcacheGeometry::default(), false);
    // Same offset under the cached and uncached windows share a slot.
    t.insert(0x8000_1000, 1);
    t.insert(0xC000_1000, 2);
    assert_eq!(t.lookup(0x8000_1000), Some(2));
}

#[test]
fn tag_table_regions() {
    let t = ICacheTagTable::new(IcacheGeometry::default(), false);
    assert_eq!(t.region_of(0x8000_0000), Some(IcacheRegion::Ram));
    assert_eq!(t.region_of(0x7E00_0000 | VMEM_BIT), Some(IcacheRegion::Vmem));
    // Extended RAM is not cacheable without the platform flag.
    assert_eq!(t.region_of(0x9000_0000 | EXRAM_BIT), None);

    let wii = ICacheTagTable::new(IcacheGeometry::default(), true);
    assert_eq!(wii.region_of(0x9000_0000), Some(IcacheRegion::ExRam));
}

#[test]
fn tag_table_uncacheable_insert_is_ignored() {
    let mut t = ICacheTagTable::new(IcacheGeometry::default(), false);
    t.insert(0x9000_0000, 3);
    assert_eq!(t.lookup(0x9000_0000), None);
}

#[test]
fn tag_table_range_invalidate() {
    let mut t = ICacheTagTable::new(IcacheGeometry::default(), false);
    for (i, pc) in (0x8000_0000..0x8000_0040).step_by(4).enumerate() {
        t.insert(pc, i as u32);
    }
    t.invalidate(0x8000_0010, 0x10);
    assert_eq!(t.lookup(0x8000_000C), Some(3));
    assert_eq!(t.lookup(0x8000_0010), None);
    assert_eq!(t.lookup(0x8000_001C), None);
    assert_eq!(t.lookup(0x8000_0020), Some(8));
}

#[test]
fn tag_table_reset() {
    let mut t = ICacheTagTable::new(IcacheGeometry::default(), false);
    t.insert(0x8000_0000, 0);
    t.insert(0x8100_0000, 1);
    t.reset();
    assert_eq!(t.lookup(0x8000_0000), None);
    assert_eq!(t.lookup(0x8100_0000), None);
}

// ── Blocks and checksums ────────────────────────────────────

#[test]
fn checksum_detects_any_word_change() {
    let words = [0x3860_0001, 0x4E80_0020];
    let a = checksum_words(&words);
    assert_eq!(a, checksum_words(&words));
    assert_ne!(a, checksum_words(&[0x3860_0002, 0x4E80_0020]));
    assert_ne!(a, checksum_words(&[0x3860_0001]));

    let mut inc = BlockChecksum::new();
    inc.push(words[0]);
    inc.push(words[1]);
    assert_eq!(inc.finish(), a);
}

#[test]
fn compiled_block_ranges() {
    let b = CompiledBlock {
        address: 0x8000_3000,
        phys_address: 0x3000,
        mode: AddressingMode::REAL,
        num_insns: 4,
        checksum: 0,
        host_offset: 0,
        host_size: 0,
        cost: 4,
        generation: 0,
        invalid: false,
    };
    assert_eq!(b.guest_len(), 16);
    assert_eq!(b.phys_end(), 0x3010);
    assert!(b.overlaps(0x300C, 0x3010));
    assert!(!b.overlaps(0x3010, 0x3020));
    assert!(!b.overlaps(0x2FF0, 0x3000));
}

#[test]
fn addressing_mode_from_msr() {
    assert_eq!(AddressingMode::from_msr(0), AddressingMode::REAL);
    let m = AddressingMode::from_msr(MSR_IR);
    assert!(m.insn_translation());
    assert!(!m.data_translation());
    let m = AddressingMode::from_msr(MSR_IR | MSR_DR);
    assert_eq!(m.to_string(), "ID");
    assert_ne!(AddressingMode::from_msr(MSR_DR), m);
}

// ── CPU state ───────────────────────────────────────────────

#[test]
fn global_register_mapping() {
    let mut s = CpuState::new();
    s.set_reg(GlobalReg::Gpr(5), 0x1234);
    s.set_reg(GlobalReg::Spr(8), 0x8000_0000);
    s.set_reg(GlobalReg::Cr, 0x2000_0000);
    assert_eq!(s.gpr[5], 0x1234);
    assert_eq!(s.lr(), 0x8000_0000);
    assert_eq!(s.cr_field(0), 0x2);
    assert_eq!(s.reg(GlobalReg::Spr(8)), 0x8000_0000);
}

#[test]
fn cr_field_update() {
    let mut s = CpuState::new();
    s.cr = 0xFFFF_FFFF;
    s.set_cr_field(3, 0x4);
    assert_eq!(s.cr, 0xFFF4_FFFF);
    assert_eq!(s.cr_field(3), 0x4);
}

#[test]
fn raise_dsi_records_cause() {
    let mut s = CpuState::new();
    s.raise_dsi(0x1234_5678, true);
    assert!(s.exceptions.contains(ExceptionFlags::DSI));
    assert_eq!(s.spr[ppc_core::state::SPR_DAR], 0x1234_5678);
    assert_eq!(s.spr[ppc_core::state::SPR_DSISR], (1 << 30) | (1 << 25));
}

// ── IR ──────────────────────────────────────────────────────

#[test]
fn opcode_eval() {
    assert_eq!(Opcode::Add.eval_binary(u32::MAX, 2), Some(1));
    assert_eq!(Opcode::Sar.eval_binary(0x8000_0000, 31), Some(u32::MAX));
    assert_eq!(Opcode::RotL.eval_binary(0x8000_0001, 1), Some(3));
    assert_eq!(Opcode::Clz.eval_unary(0), Some(32));
    assert_eq!(Opcode::Ext8S.eval_unary(0x80), Some(0xFFFF_FF80));
    assert_eq!(Opcode::Mov.eval_binary(1, 2), None);
}

#[test]
fn cond_eval_and_invert() {
    assert!(Cond::Lt.eval(u32::MAX, 0));
    assert!(!Cond::Ltu.eval(u32::MAX, 0));
    assert!(Cond::Geu.eval(u32::MAX, 0));
    for c in [Cond::Eq, Cond::Ne, Cond::Lt, Cond::Ge, Cond::Ltu, Cond::Gtu] {
        for (a, b) in [(0, 0), (1, 2), (u32::MAX, 1)] {
            assert_eq!(c.invert().eval(a, b), !c.eval(a, b), "{}", c.name());
        }
    }
}

#[test]
fn context_temps_and_globals() {
    let mut ctx = Context::new();
    let r3 = ctx.global(GlobalReg::Gpr(3));
    assert_eq!(ctx.global(GlobalReg::Gpr(3)), r3);
    let t = ctx.new_temp();
    let c = ctx.new_const(42);
    assert_eq!(ctx.temp(r3).kind, TempKind::Global);
    assert_eq!(ctx.temp(t).kind, TempKind::Ebb);
    assert!(ctx.temp(c).is_const());
    assert_eq!(ctx.nb_globals(), 1);

    ctx.reset();
    assert_eq!(ctx.num_ops(), 0);
    assert_eq!(ctx.nb_temps(), ctx.nb_globals());
}

#[test]
fn dump_shows_block_shape() {
    let mut ctx = Context::new();
    let r3 = ctx.global(GlobalReg::Gpr(3));
    let pc = ctx.global(GlobalReg::Pc);
    ctx.gen_insn_start(0x8000_3000, 1);
    let t = ctx.new_temp();
    ctx.gen_addi(t, r3, 1);
    let addr = ctx.new_const(0x8010_0000);
    ctx.gen_st(MemOp::U32, t, addr);
    ctx.gen_movi(pc, 0x8000_3004);
    let zero = ctx.new_const(0);
    ctx.gen_exit_tb(ExitKind::Branch, zero, 1);

    let mut out = Vec::new();
    dump_ops(&ctx, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("0x80003000"), "{text}");
    assert!(text.contains("r3"), "{text}");
    assert!(text.contains("exit_tb"), "{text}");
}
