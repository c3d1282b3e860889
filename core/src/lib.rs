pub mod block;
pub mod context;
pub mod dump;
pub mod icache;
pub mod ir_builder;
pub mod label;
pub mod mode;
pub mod op;
pub mod opcode;
pub mod state;
pub mod temp;
pub mod types;

pub use block::{checksum_words, BlockChecksum, CompiledBlock};
pub use context::{Context, MAX_INSNS};
pub use icache::{ICacheTagTable, IcacheGeometry, IcacheRegion, NOT_FOUND};
pub use label::Label;
pub use mode::AddressingMode;
pub use op::{Op, OpIdx, MAX_OP_ARGS};
pub use opcode::{OpDef, OpFlags, Opcode, OPCODE_DEFS};
pub use state::{CpuState, ExceptionFlags};
pub use temp::{GlobalReg, Temp, TempIdx, TempKind};
pub use types::{BlockExit, Cond, ExitKind, MemOp};
