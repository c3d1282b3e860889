use bitflags::bitflags;

use crate::state::{MSR_DR, MSR_IR};

bitflags! {
    /// Address translation state derived from MSR.IR / MSR.DR.
    ///
    /// Blocks are keyed by `(pc, AddressingMode)`: the same guest
    /// address may decode to different code when translation is toggled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct AddressingMode: u8 {
        const INSN_TRANSLATION = 0x1;
        const DATA_TRANSLATION = 0x2;
    }
}

impl AddressingMode {
    pub const REAL: AddressingMode = AddressingMode::empty();

    pub fn from_msr(msr: u32) -> Self {
        let mut mode = Self::empty();
        if msr & MSR_IR != 0 {
            mode |= Self::INSN_TRANSLATION;
        }
        if msr & MSR_DR != 0 {
            mode |= Self::DATA_TRANSLATION;
        }
        mode
    }

    pub fn insn_translation(self) -> bool {
        self.contains(Self::INSN_TRANSLATION)
    }

    pub fn data_translation(self) -> bool {
        self.contains(Self::DATA_TRANSLATION)
    }
}

impl std::fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let i = if self.insn_translation() { 'I' } else { '-' };
        let d = if self.data_translation() { 'D' } else { '-' };
        write!(f, "{i}{d}")
    }
}
