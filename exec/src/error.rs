use ppc_backend::CodeBufferFull;
use ppc_memory::MemFault;
use thiserror::Error;

/// Why a block could not be compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    CodeBuffer(#[from] CodeBufferFull),
    #[error("block table full ({max} blocks)")]
    BlockTableFull { max: usize },
    #[error("instruction fetch fault at {pc:#010x}")]
    Fetch {
        pc: u32,
        #[source]
        fault: MemFault,
    },
}

impl CompileError {
    /// Whether clearing the cache can make room for the block.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, CompileError::CodeBuffer(_) | CompileError::BlockTableFull { .. })
    }
}

/// Host-side failure of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("code space exhausted compiling block at {pc:#010x}, even after a full clear")]
    CodeBufferExhausted { pc: u32 },
}
