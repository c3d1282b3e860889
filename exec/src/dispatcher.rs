//! The dispatch loop.
//!
//! One iteration ([`Dispatcher::run_once`]) is:
//! 1. safe point: apply queued invalidations, poll the stop flag;
//! 2. advance timing while `downcount <= 0`, checking external
//!    exceptions after every advance;
//! 3. debug check (breakpoint or single-step request);
//! 4. look up the block for `(pc, mode)`, validating its checksum;
//! 5. compile on a miss, retrying once after a full clear when code
//!    space runs out;
//! 6. execute and act on the block's exit.

use std::sync::Arc;

use ppc_backend::{HostCodeGen, ThreadedBackend};
use ppc_core::{AddressingMode, BlockExit, CpuState, ExceptionFlags, ExitKind};
use ppc_frontend::gekko::GekkoFrontend;
use ppc_frontend::BlockTranslator;
use ppc_memory::{Access, GuestMemory, MemFault};
use tracing::{debug, info, trace, warn};

use crate::config::JitConfig;
use crate::control::CpuControl;
use crate::debug::{DebugHost, DebugStop};
use crate::error::{CompileError, ExecError};
use crate::exceptions::{check_exceptions, check_external_exceptions};
use crate::hle::{HleFunction, HleOutcome, HleTable};
use crate::timing::{CoreTiming, Scheduler};
use crate::{ExecEnv, ExecStats};

/// Why [`Dispatcher::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// A stop was requested (flag or HLE stop hook).
    Stopped,
    /// Stopped for the debugger before executing `pc`.
    Debug(DebugStop),
}

/// Size of the line invalidated by `icbi`.
const ICACHE_LINE: u32 = 32;

pub struct Dispatcher<S: Scheduler = CoreTiming, B: HostCodeGen = ThreadedBackend> {
    pub state: CpuState,
    env: ExecEnv<B>,
    mem: Box<dyn GuestMemory>,
    scheduler: S,
    debugger: Option<Box<dyn DebugHost>>,
    hle: HleTable,
    control: Arc<CpuControl>,
    config: JitConfig,
    stats: ExecStats,
    /// PC whose breakpoint is ignored once, after resuming from it.
    skip_breakpoint_at: Option<u32>,
}

impl Dispatcher {
    /// Gekko frontend, threaded backend and [`CoreTiming`].
    pub fn new(config: JitConfig, mem: Box<dyn GuestMemory>) -> Self {
        let timing = CoreTiming::new(config.max_slice_cycles);
        Self::with_parts(
            config,
            mem,
            timing,
            Box::new(GekkoFrontend::new()),
            ThreadedBackend::new(),
        )
    }
}

impl<S: Scheduler, B: HostCodeGen> Dispatcher<S, B> {
    pub fn with_parts(
        config: JitConfig,
        mem: Box<dyn GuestMemory>,
        scheduler: S,
        frontend: Box<dyn BlockTranslator>,
        backend: B,
    ) -> Self {
        Self {
            state: CpuState::new(),
            env: ExecEnv::new(&config, frontend, backend),
            mem,
            scheduler,
            debugger: None,
            hle: HleTable::new(),
            control: Arc::new(CpuControl::new()),
            config,
            stats: ExecStats::default(),
            skip_breakpoint_at: None,
        }
    }

    // -- Accessors ------------------------------------------

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    pub fn stats(&self) -> &ExecStats {
        &self.stats
    }

    pub fn control(&self) -> Arc<CpuControl> {
        Arc::clone(&self.control)
    }

    pub fn env(&self) -> &ExecEnv<B> {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut ExecEnv<B> {
        &mut self.env
    }

    pub fn memory(&self) -> &dyn GuestMemory {
        &*self.mem
    }

    pub fn memory_mut(&mut self) -> &mut dyn GuestMemory {
        &mut *self.mem
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn set_debugger(&mut self, host: Box<dyn DebugHost>) {
        self.debugger = Some(host);
    }

    pub fn debugger(&self) -> Option<&dyn DebugHost> {
        self.debugger.as_deref()
    }

    pub fn debugger_mut(&mut self) -> Option<&mut (dyn DebugHost + 'static)> {
        self.debugger.as_deref_mut()
    }

    pub fn set_debugging(&mut self, on: bool) {
        self.config.enable_debugging = on;
    }

    pub fn set_icache_check(&mut self, on: bool) {
        self.config.icache_check = on;
        self.env.cache.set_checking(on);
    }

    /// Hook `address`. Drops every compiled block so the hook takes
    /// effect even where the address was already translated.
    pub fn register_hle(&mut self, address: u32, name: &str, func: HleFunction) -> u32 {
        let id = self.hle.register(address, name, func);
        if !self.env.cache.is_empty() {
            self.clear_cache();
        }
        id
    }

    /// Reset the CPU to start at `pc`.
    pub fn reset(&mut self, pc: u32) {
        self.state.reset(pc);
        self.skip_breakpoint_at = None;
    }

    /// Invalidate translated code for a physical range. Must be called
    /// from the thread owning the dispatcher; other threads go through
    /// [`CpuControl::queue_invalidation`].
    pub fn invalidate_icache(&mut self, start: u32, len: u32) {
        let n = self.env.cache.invalidate(start, len);
        self.stats.blocks_invalidated += n as u64;
    }

    pub fn clear_cache(&mut self) {
        self.env.cache.clear();
        self.stats.cache_clears += 1;
    }

    // -- Main loop ------------------------------------------

    /// Run until stopped or the debugger takes over.
    pub fn run(&mut self) -> Result<ExitReason, ExecError> {
        loop {
            if let Some(reason) = self.run_once()? {
                return Ok(reason);
            }
        }
    }

    /// One dispatcher iteration. `Ok(None)` means keep going.
    pub fn run_once(&mut self) -> Result<Option<ExitReason>, ExecError> {
        self.drain_invalidations();
        if self.control.stop_requested() {
            info!(pc = format_args!("{:#010x}", self.state.pc), "dispatcher stopped");
            return Ok(Some(ExitReason::Stopped));
        }

        while self.state.downcount <= 0 {
            self.scheduler.advance(&mut self.state);
            self.stats.timing_advances += 1;
            self.state.npc = self.state.pc;
            if check_external_exceptions(&mut self.state).is_some() {
                self.stats.exceptions_delivered += 1;
            }
            if self.control.stop_requested() {
                info!(pc = format_args!("{:#010x}", self.state.pc), "dispatcher stopped");
                return Ok(Some(ExitReason::Stopped));
            }
        }

        if self.config.enable_debugging {
            if let Some(stop) = self.check_debug() {
                return Ok(Some(ExitReason::Debug(stop)));
            }
        }

        let pc = self.state.pc;
        let mode = AddressingMode::from_msr(self.state.msr);
        let id = match self.env.cache.lookup(pc, mode) {
            Some(id) if self.env.cache.validate(id, &*self.mem) => {
                self.stats.cache_hits += 1;
                id
            }
            found => {
                if let Some(stale) = found {
                    self.stats.checksum_mismatches += 1;
                    let b = self.env.cache.get(stale);
                    let (start, len) = (b.phys_address, b.guest_len());
                    debug!(pc = format_args!("{pc:#010x}"), "checksum mismatch");
                    self.invalidate_icache(start, len);
                }
                self.stats.cache_misses += 1;
                match self.compile(pc, mode)? {
                    Some(id) => id,
                    None => return Ok(None),
                }
            }
        };

        self.control.block_entered();
        let exit = self.env.execute(id, &mut self.state, &mut *self.mem);
        self.control.block_exited();
        self.stats.blocks_executed += 1;
        trace!(
            pc = format_args!("{pc:#010x}"),
            exit = exit.kind.name(),
            next = format_args!("{:#010x}", self.state.pc),
            "block executed"
        );
        Ok(self.handle_exit(exit, mode))
    }

    /// Execute exactly one guest instruction at `pc`, bypassing the
    /// block cache and breakpoints.
    pub fn step_instruction(&mut self) -> Result<Option<ExitReason>, ExecError> {
        self.drain_invalidations();
        let pc = self.state.pc;
        let mode = AddressingMode::from_msr(self.state.msr);
        let exit = self.retry_exhausted(pc, |d| {
            d.control.block_entered();
            let r = d.env.run_scratch(&mut d.state, &mut *d.mem, &d.hle);
            d.control.block_exited();
            r
        })?;
        let Some(exit) = exit else {
            return Ok(None);
        };
        self.stats.instructions_stepped += 1;
        Ok(self.handle_exit(exit, mode))
    }

    // -- Helpers --------------------------------------------

    fn drain_invalidations(&mut self) {
        for (start, len) in self.control.drain_invalidations() {
            self.invalidate_icache(start, len);
        }
    }

    fn check_debug(&mut self) -> Option<DebugStop> {
        let pc = self.state.pc;
        let skip = self.skip_breakpoint_at.take() == Some(pc);
        let step = self.control.take_step();
        let bp = !skip && self.debugger.as_ref().is_some_and(|d| d.is_breakpoint(pc));
        let stop = if bp {
            DebugStop::Breakpoint(pc)
        } else if step {
            DebugStop::Step(pc)
        } else {
            return None;
        };
        self.skip_breakpoint_at = Some(pc);
        self.stats.debug_stops += 1;
        if let Some(d) = self.debugger.as_mut() {
            d.on_debug_stop(&self.state, stop);
        }
        Some(stop)
    }

    fn compile(&mut self, pc: u32, mode: AddressingMode) -> Result<Option<u32>, ExecError> {
        let id = self.retry_exhausted(pc, |d| d.env.compile(pc, mode, &*d.mem, &d.hle))?;
        if id.is_some() {
            self.stats.compiles += 1;
        }
        Ok(id)
    }

    /// Run `f`, clearing the cache and retrying once if code space runs
    /// out. `Ok(None)` means the instruction fetch faulted and an ISI
    /// was delivered instead.
    fn retry_exhausted<T>(
        &mut self,
        pc: u32,
        mut f: impl FnMut(&mut Self) -> Result<T, CompileError>,
    ) -> Result<Option<T>, ExecError> {
        let mut cleared = false;
        loop {
            match f(self) {
                Ok(v) => return Ok(Some(v)),
                Err(CompileError::Fetch { fault, .. }) => {
                    self.raise_isi(pc, fault);
                    return Ok(None);
                }
                Err(e) if !cleared => {
                    warn!(pc = format_args!("{pc:#010x}"), error = %e, "code space exhausted, clearing cache");
                    self.clear_cache();
                    cleared = true;
                }
                Err(_) => return Err(ExecError::CodeBufferExhausted { pc }),
            }
        }
    }

    fn raise_isi(&mut self, pc: u32, fault: MemFault) {
        debug!(pc = format_args!("{pc:#010x}"), %fault, "instruction fetch fault");
        self.state.pc = pc;
        self.state.npc = pc;
        self.state.exceptions |= ExceptionFlags::ISI;
        if check_exceptions(&mut self.state).is_some() {
            self.stats.exceptions_delivered += 1;
        }
    }

    fn handle_exit(&mut self, exit: BlockExit, mode: AddressingMode) -> Option<ExitReason> {
        match exit.kind {
            ExitKind::Branch => self.state.npc = self.state.pc,
            ExitKind::Exception => {
                self.state.exceptions |= ExceptionFlags::from_bits_truncate(exit.value);
                if check_exceptions(&mut self.state).is_some() {
                    self.stats.exceptions_delivered += 1;
                }
            }
            ExitKind::CheckExternal => {
                self.state.npc = self.state.pc;
                if check_external_exceptions(&mut self.state).is_some() {
                    self.stats.exceptions_delivered += 1;
                }
            }
            ExitKind::Hle => {
                self.stats.hle_calls += 1;
                self.state.downcount -= 1;
                if self.hle.call(exit.value, &mut self.state, &mut *self.mem) == HleOutcome::Stop {
                    info!(pc = format_args!("{:#010x}", self.state.pc), "stopped by hle hook");
                    return Some(ExitReason::Stopped);
                }
            }
            ExitKind::InvalidateLine => {
                self.state.npc = self.state.pc;
                match self.mem.translate_address(exit.value, Access::Read, mode) {
                    Ok(phys) => self.invalidate_icache(phys & !(ICACHE_LINE - 1), ICACHE_LINE),
                    Err(fault) => debug!(%fault, "icbi on untranslated address ignored"),
                }
            }
        }
        None
    }
}
