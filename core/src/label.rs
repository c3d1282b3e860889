/// Branch target inside one block.
///
/// A branch may be lowered before its label is placed; its code-buffer
/// index is parked in `pending` and patched when the label lands.
#[derive(Debug, Clone, Default)]
pub struct Label {
    pub id: u32,
    /// `gen_set_label` was emitted for this label.
    pub placed: bool,
    /// Host code offset, known once lowered.
    pub offset: Option<usize>,
    pub pending: Vec<usize>,
}

impl Label {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Record the host offset and hand back every branch to patch.
    pub fn resolve(&mut self, offset: usize) -> Vec<usize> {
        self.placed = true;
        self.offset = Some(offset);
        std::mem::take(&mut self.pending)
    }

    pub fn is_dangling(&self) -> bool {
        self.offset.is_none() && !self.pending.is_empty()
    }
}
