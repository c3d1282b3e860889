//! Disassembler framework.
//!
//! Each guest architecture provides a `print_insn_*` entry point that
//! renders one instruction word at a given PC as assembly text.

pub mod gekko;

pub use gekko::print_insn_gekko;
