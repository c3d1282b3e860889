//! High-level emulation hooks.
//!
//! A hooked guest address always starts its own one-instruction block
//! whose only effect is an HLE exit. The dispatcher then runs the host
//! replacement registered here instead of the guest code.

use std::collections::HashMap;
use std::fmt;

use ppc_core::CpuState;
use ppc_frontend::HookQuery;
use ppc_memory::GuestMemory;

/// Host replacement for a guest function.
pub enum HleFunction {
    /// Return to LR without doing anything.
    ReturnToCaller,
    /// Set r3 and return to LR.
    ReturnValue(u32),
    /// Stop the dispatcher with the PC left on the hooked address.
    Stop,
    /// Run host code, then return to LR.
    Custom(Box<dyn FnMut(&mut CpuState, &mut dyn GuestMemory) + Send>),
}

impl fmt::Debug for HleFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HleFunction::ReturnToCaller => f.write_str("ReturnToCaller"),
            HleFunction::ReturnValue(v) => write!(f, "ReturnValue({v:#x})"),
            HleFunction::Stop => f.write_str("Stop"),
            HleFunction::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// What the dispatcher does after a hook ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HleOutcome {
    Continue,
    Stop,
}

struct Hook {
    name: String,
    func: HleFunction,
}

/// Registered hooks by guest address.
#[derive(Default)]
pub struct HleTable {
    by_address: HashMap<u32, u32>,
    hooks: Vec<Hook>,
}

impl HleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook `address`, returning the hook id. Re-registering an address
    /// replaces its previous hook.
    pub fn register(&mut self, address: u32, name: &str, func: HleFunction) -> u32 {
        let id = self.hooks.len() as u32;
        self.hooks.push(Hook {
            name: name.to_string(),
            func,
        });
        self.by_address.insert(address, id);
        id
    }

    pub fn unregister(&mut self, address: u32) -> bool {
        self.by_address.remove(&address).is_some()
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.hooks.get(id as usize).map(|h| h.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    /// Run hook `id` for a call at `state.pc`.
    pub fn call(&mut self, id: u32, state: &mut CpuState, mem: &mut dyn GuestMemory) -> HleOutcome {
        let Some(hook) = self.hooks.get_mut(id as usize) else {
            return HleOutcome::Continue;
        };
        tracing::trace!(name = %hook.name, pc = format_args!("{:#010x}", state.pc), "hle call");
        match &mut hook.func {
            HleFunction::Stop => return HleOutcome::Stop,
            HleFunction::ReturnToCaller => {}
            HleFunction::ReturnValue(v) => state.gpr[3] = *v,
            HleFunction::Custom(f) => f(state, mem),
        }
        state.pc = state.lr();
        state.npc = state.pc;
        HleOutcome::Continue
    }
}

impl HookQuery for HleTable {
    fn hook_at(&self, pc: u32) -> Option<u32> {
        self.by_address.get(&pc).copied()
    }
}
