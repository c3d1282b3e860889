use std::fs;
use std::path::Path;

use anyhow::Context;
use ppc_core::state::{MSR_DR, MSR_IR};
use ppc_exec::JitConfig;
use ppc_memory::MemoryConfig;
use serde::Deserialize;

/// Where and how the flat image is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Physical address the image is copied to.
    pub load_address: u32,
    /// Initial PC.
    pub entry: u32,
    pub msr: u32,
    /// Initial r1.
    pub stack_pointer: u32,
    /// Returning here stops the run. Also loaded into LR at boot.
    pub exit_address: Option<u32>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            load_address: 0x0000_3100,
            entry: 0x8000_3100,
            msr: MSR_IR | MSR_DR,
            stack_pointer: 0x817F_FFF0,
            exit_address: None,
        }
    }
}

/// Contents of a `ppc-run` TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub jit: JitConfig,
    pub memory: MemoryConfig,
    pub boot: BootConfig,
}

impl RunnerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}
