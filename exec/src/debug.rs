//! Breakpoints and the debugger-facing host interface.

use std::collections::BTreeMap;

use ppc_core::CpuState;
use tracing::info;

/// Why the dispatcher stopped for the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugStop {
    /// Reached a breakpoint at this address, before executing it.
    Breakpoint(u32),
    /// A single step was requested; stopped before this address.
    Step(u32),
}

impl DebugStop {
    pub fn pc(&self) -> u32 {
        match *self {
            DebugStop::Breakpoint(pc) | DebugStop::Step(pc) => pc,
        }
    }
}

/// Host side of debugging, consulted only when debugging is enabled.
pub trait DebugHost: Send {
    fn is_breakpoint(&self, pc: u32) -> bool;

    /// Called once each time the dispatcher stops for the debugger.
    fn on_debug_stop(&mut self, state: &CpuState, stop: DebugStop);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakPoint {
    pub address: u32,
    pub enabled: bool,
    /// Removed after the first hit.
    pub temporary: bool,
}

#[derive(Debug, Default, Clone)]
pub struct BreakPoints {
    map: BTreeMap<u32, BreakPoint>,
}

impl BreakPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, address: u32) {
        self.insert(address, false);
    }

    pub fn add_temporary(&mut self, address: u32) {
        self.insert(address, true);
    }

    fn insert(&mut self, address: u32, temporary: bool) {
        self.map.insert(
            address,
            BreakPoint {
                address,
                enabled: true,
                temporary,
            },
        );
    }

    pub fn remove(&mut self, address: u32) -> bool {
        self.map.remove(&address).is_some()
    }

    pub fn set_enabled(&mut self, address: u32, enabled: bool) {
        if let Some(bp) = self.map.get_mut(&address) {
            bp.enabled = enabled;
        }
    }

    /// Whether an enabled breakpoint is set at `address`.
    pub fn is_address_breakpoint(&self, address: u32) -> bool {
        self.map.get(&address).is_some_and(|bp| bp.enabled)
    }

    pub fn is_temporary(&self, address: u32) -> bool {
        self.map.get(&address).is_some_and(|bp| bp.temporary)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BreakPoint> {
        self.map.values()
    }
}

/// A [`DebugHost`] with a breakpoint list and a record of every stop.
#[derive(Debug, Default)]
pub struct Debugger {
    pub breakpoints: BreakPoints,
    history: Vec<DebugStop>,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[DebugStop] {
        &self.history
    }

    pub fn last_stop(&self) -> Option<DebugStop> {
        self.history.last().copied()
    }
}

impl DebugHost for Debugger {
    fn is_breakpoint(&self, pc: u32) -> bool {
        self.breakpoints.is_address_breakpoint(pc)
    }

    fn on_debug_stop(&mut self, state: &CpuState, stop: DebugStop) {
        info!(pc = format_args!("{:#010x}", state.pc), ?stop, "debug stop");
        if let DebugStop::Breakpoint(pc) = stop {
            if self.breakpoints.is_temporary(pc) {
                self.breakpoints.remove(pc);
            }
        }
        self.history.push(stop);
    }
}
