//! Execution engine: block cache, dispatcher and the services around it.
//!
//! The dispatcher drives the advance-timing -> debug-check -> lookup ->
//! validate -> compile -> execute cycle, delivering guest exceptions
//! and running HLE hooks between blocks.

pub mod block_cache;
pub mod config;
pub mod control;
pub mod debug;
pub mod dispatcher;
pub mod error;
pub mod exceptions;
pub mod guard;
pub mod hle;
pub mod timing;

use std::fmt;

pub use block_cache::BlockCache;
pub use config::JitConfig;
pub use control::CpuControl;
pub use debug::{BreakPoints, DebugHost, DebugStop, Debugger};
pub use dispatcher::{Dispatcher, ExitReason};
pub use error::{CompileError, ExecError};
pub use guard::{run_guarded, CpuThread, CpuThreadGuard, EmuThreadLock};
pub use hle::{HleFunction, HleTable};
pub use timing::{CoreTiming, EventQueue, EventTypeId, Scheduler};

use ppc_backend::translate::translate;
use ppc_backend::{ExecCtx, HostCodeGen, ThreadedBackend};
use ppc_core::{AddressingMode, BlockExit, Context, CpuState};
use ppc_frontend::{BlockTranslator, HookQuery, TranslateRequest};
use ppc_memory::GuestMemory;

/// Execution environment holding all shared translation state.
pub struct ExecEnv<B: HostCodeGen = ThreadedBackend> {
    pub cache: BlockCache,
    pub ir: Context,
    pub frontend: Box<dyn BlockTranslator>,
    pub backend: B,
    pub max_block_insns: u32,
}

impl<B: HostCodeGen> ExecEnv<B> {
    pub fn new(config: &JitConfig, frontend: Box<dyn BlockTranslator>, backend: B) -> Self {
        Self {
            cache: BlockCache::new(config),
            ir: Context::new(),
            frontend,
            backend,
            max_block_insns: config.max_block_insns,
        }
    }

    /// Compile the block at `pc` into the cache.
    pub fn compile(
        &mut self,
        pc: u32,
        mode: AddressingMode,
        mem: &dyn GuestMemory,
        hooks: &dyn HookQuery,
    ) -> Result<u32, CompileError> {
        let req = TranslateRequest {
            pc,
            mode,
            max_insns: self.max_block_insns,
            hooks,
        };
        self.cache
            .compile(&mut self.ir, &mut *self.frontend, &mut self.backend, mem, &req)
    }

    /// Run cached block `id` to its exit.
    pub fn execute(&mut self, id: u32, state: &mut CpuState, mem: &mut dyn GuestMemory) -> BlockExit {
        let b = self.cache.get(id);
        let (offset, mode) = (b.host_offset, b.mode);
        self.backend.exec_block(
            self.cache.code(),
            offset,
            ExecCtx { state, mem, mode },
        )
    }

    /// Translate and run a block of exactly one instruction at
    /// `state.pc` without caching it. Its code space is released again
    /// before returning.
    pub fn run_scratch(
        &mut self,
        state: &mut CpuState,
        mem: &mut dyn GuestMemory,
        hooks: &dyn HookQuery,
    ) -> Result<BlockExit, CompileError> {
        let pc = state.pc;
        let mode = AddressingMode::from_msr(state.msr);
        let req = TranslateRequest {
            pc,
            mode,
            max_insns: 1,
            hooks,
        };
        self.frontend
            .gen_code(&mut self.ir, &*mem, &req)
            .map_err(|fault| CompileError::Fetch { pc, fault })?;
        let code = self.cache.code_mut();
        let start = translate(&mut self.ir, &mut self.backend, code)?;
        let exit = self
            .backend
            .exec_block(code, start, ExecCtx { state, mem, mode });
        code.set_offset(start);
        Ok(exit)
    }
}

/// Dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecStats {
    pub blocks_executed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub compiles: u64,
    pub checksum_mismatches: u64,
    pub blocks_invalidated: u64,
    pub cache_clears: u64,
    pub exceptions_delivered: u64,
    pub timing_advances: u64,
    pub hle_calls: u64,
    pub debug_stops: u64,
    pub instructions_stepped: u64,
}

impl fmt::Display for ExecStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "blocks executed:     {}", self.blocks_executed)?;
        writeln!(
            f,
            "cache hits/misses:   {}/{}",
            self.cache_hits, self.cache_misses
        )?;
        writeln!(f, "compiles:            {}", self.compiles)?;
        writeln!(f, "checksum mismatches: {}", self.checksum_mismatches)?;
        writeln!(f, "blocks invalidated:  {}", self.blocks_invalidated)?;
        writeln!(f, "cache clears:        {}", self.cache_clears)?;
        writeln!(f, "exceptions:          {}", self.exceptions_delivered)?;
        writeln!(f, "timing advances:     {}", self.timing_advances)?;
        writeln!(f, "hle calls:           {}", self.hle_calls)?;
        writeln!(f, "debug stops:         {}", self.debug_stops)?;
        write!(f, "instructions stepped: {}", self.instructions_stepped)
    }
}
