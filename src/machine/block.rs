//! Basic blocks of a machine function.

use std::{collections::BTreeSet, fmt};

use crate::machine::{InstrId, Reg};

/// A strongly-typed basic block number.
///
/// Block numbers are dense, `0..block_count`, so they index per-block side
/// tables directly. Block 0 is the function entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);

impl BlockId {
    /// Creates a block id from a raw block number.
    #[must_use]
    #[inline]
    pub const fn new(number: u32) -> Self {
        BlockId(number)
    }

    /// Returns the block number as an index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the raw block number.
    #[must_use]
    #[inline]
    pub const fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb.{}", self.0)
    }
}

impl From<u32> for BlockId {
    #[inline]
    fn from(number: u32) -> Self {
        BlockId(number)
    }
}

/// A basic block: an ordered list of instruction handles, its CFG edges and
/// the registers live on entry.
///
/// Instructions themselves live in the owning
/// [`MachineFunction`](crate::machine::MachineFunction)'s arena; the block only
/// keeps their order.
#[derive(Debug, Clone)]
pub struct MachineBasicBlock {
    id: BlockId,
    instrs: Vec<InstrId>,
    preds: Vec<BlockId>,
    succs: Vec<BlockId>,
    live_ins: BTreeSet<Reg>,
}

impl MachineBasicBlock {
    pub(crate) fn new(id: BlockId) -> Self {
        Self {
            id,
            instrs: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            live_ins: BTreeSet::new(),
        }
    }

    /// The block's number.
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Instruction handles in program order.
    #[must_use]
    pub fn instructions(&self) -> &[InstrId] {
        &self.instrs
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Returns `true` if the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Position of `instr` within the block.
    #[must_use]
    pub fn position(&self, instr: InstrId) -> Option<usize> {
        self.instrs.iter().position(|&i| i == instr)
    }

    /// Predecessor blocks in edge insertion order.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.preds
    }

    /// Successor blocks in edge insertion order.
    #[must_use]
    pub fn successors(&self) -> &[BlockId] {
        &self.succs
    }

    /// Returns `true` if the block has no predecessors.
    #[must_use]
    pub fn pred_empty(&self) -> bool {
        self.preds.is_empty()
    }

    /// Registers live on entry, in register order.
    pub fn live_ins(&self) -> impl Iterator<Item = Reg> + '_ {
        self.live_ins.iter().copied()
    }

    /// Returns `true` if `reg` is recorded as live on entry.
    #[must_use]
    pub fn is_live_in(&self, reg: Reg) -> bool {
        self.live_ins.contains(&reg)
    }

    /// Records `reg` as live on entry. Returns `true` if it was not already.
    pub fn add_live_in(&mut self, reg: Reg) -> bool {
        self.live_ins.insert(reg)
    }

    pub(crate) fn push(&mut self, instr: InstrId) {
        self.instrs.push(instr);
    }

    pub(crate) fn remove(&mut self, instr: InstrId) -> Option<usize> {
        let pos = self.position(instr)?;
        self.instrs.remove(pos);
        Some(pos)
    }

    pub(crate) fn add_successor(&mut self, succ: BlockId) -> bool {
        if self.succs.contains(&succ) {
            return false;
        }
        self.succs.push(succ);
        true
    }

    pub(crate) fn add_predecessor(&mut self, pred: BlockId) {
        if !self.preds.contains(&pred) {
            self.preds.push(pred);
        }
    }
}
