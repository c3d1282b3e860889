//! Random straight-line programs must leave the same architectural state
//! whether they run through the block cache or the interpreter, however
//! the code is split into blocks and however often the cache is dropped.

use ppc_core::state::XER_CA;
use ppc_exec::JitConfig;
use ppc_memory::GuestMemory;
use proptest::prelude::*;

use crate::asm::*;

/// Base register for loads and stores; never written by generated code.
const BASE: u32 = 31;

fn reg() -> impl Strategy<Value = u32> {
    3u32..=10
}

fn arith() -> impl Strategy<Value = u32> {
    let rr = (0usize..11, reg(), reg(), reg()).prop_map(|(op, d, a, b)| {
        let f = [add, addc, adde, subf, subfc, subfe, mullw, mulhw, mulhwu, divw, divwu][op];
        f(d, a, b)
    });
    let ri = (0usize..5, reg(), reg(), any::<i16>()).prop_map(|(op, d, a, imm)| {
        let f = [addi, addic, mulli, subfic, addis][op];
        f(d, a, imm)
    });
    let unary = (0usize..5, reg(), reg()).prop_map(|(op, d, a)| {
        let f = [neg, addze, cntlzw, extsb, extsh][op];
        f(d, a)
    });
    prop_oneof![3 => rr, 2 => ri, 1 => unary, 1 => (reg(), reg(), reg()).prop_map(|(d, a, b)| add_(d, a, b))]
}

fn logic() -> impl Strategy<Value = u32> {
    let rr = (0usize..8, reg(), reg(), reg()).prop_map(|(op, a, s, b)| {
        let f = [and, or, xor, nor, andc, slw, srw, sraw][op];
        f(a, s, b)
    });
    let ri = (0usize..3, reg(), reg(), any::<u16>()).prop_map(|(op, a, s, imm)| {
        let f = [ori, xori, andi_][op];
        f(a, s, imm)
    });
    let rot = (0usize..2, reg(), reg(), 0u32..32, 0u32..32, 0u32..32).prop_map(
        |(op, a, s, sh, mb, me)| {
            let f = [rlwinm, rlwimi][op];
            f(a, s, sh, mb, me)
        },
    );
    prop_oneof![
        3 => rr,
        2 => ri,
        2 => rot,
        1 => (reg(), reg(), reg(), 0u32..32, 0u32..32).prop_map(|(a, s, b, mb, me)| rlwnm(a, s, b, mb, me)),
        1 => (reg(), reg(), 0u32..32).prop_map(|(a, s, sh)| srawi(a, s, sh)),
    ]
}

fn compare() -> impl Strategy<Value = u32> {
    prop_oneof![
        (0u32..8, reg(), any::<i16>()).prop_map(|(crf, a, imm)| cmpwi(crf, a, imm)),
        (0u32..8, reg(), any::<u16>()).prop_map(|(crf, a, imm)| cmplwi(crf, a, imm)),
        (0u32..8, reg(), reg()).prop_map(|(crf, a, b)| cmpw(crf, a, b)),
        reg().prop_map(mfcr),
    ]
}

fn memory() -> impl Strategy<Value = u32> {
    prop_oneof![
        (reg(), 0i16..16).prop_map(|(d, w)| lwz(d, BASE, w * 4)),
        (reg(), 0i16..16).prop_map(|(s, w)| stw(s, BASE, w * 4)),
        (reg(), 0i16..64).prop_map(|(d, off)| lbz(d, BASE, off)),
        (reg(), 0i16..32).prop_map(|(d, h)| lha(d, BASE, h * 2)),
    ]
}

fn special() -> impl Strategy<Value = u32> {
    prop_oneof![
        reg().prop_map(mtlr),
        reg().prop_map(mtctr),
        reg().prop_map(|s| mtspr(1, s)),
        (reg(), prop_oneof![Just(1u32), Just(8), Just(9)]).prop_map(|(d, spr)| mfspr(d, spr)),
    ]
}

fn insn() -> impl Strategy<Value = u32> {
    prop_oneof![4 => arith(), 4 => logic(), 2 => compare(), 2 => memory(), 1 => special()]
}

fn data_words(mem: &dyn GuestMemory) -> Vec<u32> {
    let mode = ppc_core::AddressingMode::from_msr(MSR);
    (0..16)
        .map(|i| mem.read_u32(DATA + i * 4, mode).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn jit_matches_interpreter(
        body in prop::collection::vec(insn(), 1..48),
        regs in prop::array::uniform8(any::<u32>()),
        ca in any::<bool>(),
        max_block_insns in 1u32..=8,
        clear_every in 0u32..4,
    ) {
        let mut code = body.clone();
        code.push(b(0));
        let end = CODE + 4 * body.len() as u32;

        let setup = |s: &mut ppc_core::CpuState| {
            s.gpr[3..=10].copy_from_slice(&regs);
            s.gpr[BASE as usize] = DATA;
            s.set_xer(if ca { XER_CA } else { 0 });
        };

        let config = JitConfig { max_block_insns, ..JitConfig::default() };
        let mut d = dispatcher_with(config, &code);
        setup(&mut d.state);
        let mut dispatches = 0u32;
        while d.state.pc != end {
            if clear_every > 0 && dispatches % clear_every == 0 {
                d.clear_cache();
            }
            prop_assert_eq!(d.run_once(), Ok(None));
            dispatches += 1;
            prop_assert!(dispatches <= 64, "no progress at {:#010x}", d.state.pc);
        }

        let mut mem = memory_with(&code);
        let mut s = cpu();
        setup(&mut s);
        interpret(&mut s, &mut mem, body.len());

        prop_assert_eq!(arch_regs(&d.state), arch_regs(&s));
        prop_assert_eq!(data_words(d.memory()), data_words(&mem));
    }
}
