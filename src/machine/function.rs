//! The machine function: blocks, CFG edges and an instruction arena.
//!
//! Instructions are stored in an arena owned by the function and referred to
//! by stable [`InstrId`] handles. Blocks keep the program order as a list of
//! handles. Erasing an instruction unlinks it from its block and empties its
//! arena slot, so any side table still holding the handle observes `None`
//! instead of a dangling reference.

use std::fmt;

use bitflags::bitflags;

use crate::{
    machine::{
        traversal::{self, Successors},
        BlockId, MachineBasicBlock, MachineInstr, RegisterInfo,
    },
    Error, Result,
};

/// A stable handle to an instruction in a [`MachineFunction`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(u32);

impl InstrId {
    /// Creates a handle from a raw arena index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        InstrId(index)
    }

    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstrId({})", self.0)
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Properties established for a function by earlier pipeline stages.
    pub struct FunctionProperties: u8 {
        /// No virtual registers remain.
        const NO_VREGS = 0x01;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Source-level function attributes relevant to code generation.
    pub struct FunctionAttributes: u8 {
        /// Optimizations are disabled for this function.
        const OPT_NONE = 0x01;
    }
}

/// Stack frame layout facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    /// The function keeps a dedicated frame pointer.
    pub has_frame_pointer: bool,
}

/// A function in machine representation.
#[derive(Debug, Clone)]
pub struct MachineFunction {
    name: String,
    blocks: Vec<MachineBasicBlock>,
    instrs: Vec<Option<MachineInstr>>,
    frame: FrameInfo,
    attributes: FunctionAttributes,
    properties: FunctionProperties,
}

impl MachineFunction {
    /// Creates a function with `block_count` empty, unconnected blocks.
    #[must_use]
    pub fn new(name: impl Into<String>, block_count: usize) -> Self {
        Self {
            name: name.into(),
            blocks: (0..block_count)
                .map(|n| MachineBasicBlock::new(BlockId::new(n as u32)))
                .collect(),
            instrs: Vec::new(),
            frame: FrameInfo::default(),
            attributes: FunctionAttributes::empty(),
            properties: FunctionProperties::empty(),
        }
    }

    /// The function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entry block.
    #[must_use]
    pub const fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    /// Number of block ids; per-block side tables are sized with this.
    #[must_use]
    pub fn num_block_ids(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&MachineBasicBlock> {
        self.blocks.get(id.index())
    }

    /// Returns the block with the given id, mutably.
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut MachineBasicBlock> {
        self.blocks.get_mut(id.index())
    }

    /// Iterates over all blocks in number order.
    pub fn blocks(&self) -> impl Iterator<Item = &MachineBasicBlock> + '_ {
        self.blocks.iter()
    }

    /// Returns a live instruction.
    #[must_use]
    pub fn instr(&self, id: InstrId) -> Option<&MachineInstr> {
        self.instrs.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns a live instruction, mutably.
    pub fn instr_mut(&mut self, id: InstrId) -> Option<&mut MachineInstr> {
        self.instrs.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Iterates over the instructions of a block in program order.
    pub fn instructions(&self, block: BlockId) -> impl Iterator<Item = (InstrId, &MachineInstr)> + '_ {
        self.block(block)
            .map(MachineBasicBlock::instructions)
            .unwrap_or_default()
            .iter()
            .filter_map(|&id| self.instr(id).map(|instr| (id, instr)))
    }

    /// Number of live instructions in the function.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(MachineBasicBlock::len).sum()
    }

    /// Appends an instruction to the end of `block`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownBlock`] if `block` does not exist.
    pub fn push_instr(&mut self, block: BlockId, mut instr: MachineInstr) -> Result<InstrId> {
        let Some(bb) = self.blocks.get_mut(block.index()) else {
            return Err(Error::UnknownBlock(block));
        };
        instr.set_parent(block);
        let id = InstrId::new(self.instrs.len() as u32);
        self.instrs.push(Some(instr));
        bb.push(id);
        Ok(id)
    }

    /// Adds a CFG edge. Duplicate edges are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownBlock`] if either block does not exist.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) -> Result<()> {
        if to.index() >= self.blocks.len() {
            return Err(Error::UnknownBlock(to));
        }
        let Some(src) = self.blocks.get_mut(from.index()) else {
            return Err(Error::UnknownBlock(from));
        };
        if src.add_successor(to) {
            self.blocks[to.index()].add_predecessor(from);
        }
        Ok(())
    }

    /// Removes an instruction from its block and from the arena.
    ///
    /// Returns the erased instruction, or `None` if the handle was not live.
    pub fn erase(&mut self, id: InstrId) -> Option<MachineInstr> {
        let instr = self.instrs.get_mut(id.index())?.take()?;
        if let Some(block) = self.blocks.get_mut(instr.parent().index()) {
            block.remove(id);
        }
        Some(instr)
    }

    /// Blocks reachable from the entry, in reverse postorder.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        traversal::reverse_postorder(self, self.entry())
    }

    /// Frame layout facts.
    #[must_use]
    pub const fn frame_info(&self) -> FrameInfo {
        self.frame
    }

    /// Sets the frame layout facts.
    pub fn set_frame_info(&mut self, frame: FrameInfo) {
        self.frame = frame;
    }

    /// The function's attributes.
    #[must_use]
    pub const fn attributes(&self) -> FunctionAttributes {
        self.attributes
    }

    /// Sets the function's attributes.
    pub fn set_attributes(&mut self, attributes: FunctionAttributes) {
        self.attributes = attributes;
    }

    /// Properties established by earlier pipeline stages.
    #[must_use]
    pub const fn properties(&self) -> FunctionProperties {
        self.properties
    }

    /// Marks additional properties as established.
    pub fn set_properties(&mut self, properties: FunctionProperties) {
        self.properties |= properties;
    }

    /// Returns `true` if any operand names a virtual register.
    #[must_use]
    pub fn has_virtual_registers(&self) -> bool {
        self.instrs
            .iter()
            .flatten()
            .flat_map(MachineInstr::operands)
            .filter_map(|op| op.reg())
            .any(|reg| reg.is_virtual())
    }

    /// Formats the function, naming registers through `regs`.
    #[must_use]
    pub fn display<'a>(&'a self, regs: &'a RegisterInfo) -> FunctionDisplay<'a> {
        FunctionDisplay {
            func: self,
            regs: Some(regs),
        }
    }
}

impl Successors for MachineFunction {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn successors(&self, node: BlockId) -> &[BlockId] {
        self.block(node)
            .map(MachineBasicBlock::successors)
            .unwrap_or_default()
    }
}

impl fmt::Display for MachineFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        FunctionDisplay {
            func: self,
            regs: None,
        }
        .fmt(f)
    }
}

/// Helper returned by [`MachineFunction::display`].
pub struct FunctionDisplay<'a> {
    func: &'a MachineFunction,
    regs: Option<&'a RegisterInfo>,
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg_name = |reg| match self.regs {
            Some(regs) => regs.display(reg),
            None => reg.to_string(),
        };
        let join = |ids: &[BlockId]| {
            ids.iter()
                .map(|b| format!("%{b}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        writeln!(f, "name: {}", self.func.name)?;
        for block in &self.func.blocks {
            writeln!(f, "{}:", block.id())?;
            if !block.pred_empty() {
                writeln!(f, "  ; predecessors: {}", join(block.predecessors()))?;
            }
            if !block.successors().is_empty() {
                writeln!(f, "  successors: {}", join(block.successors()))?;
            }
            let live_ins: Vec<String> = block.live_ins().map(reg_name).collect();
            if !live_ins.is_empty() {
                writeln!(f, "  liveins: {}", live_ins.join(", "))?;
            }
            for (_, instr) in self.func.instructions(block.id()) {
                match self.regs {
                    Some(regs) => writeln!(f, "  {}", instr.display(regs))?,
                    None => writeln!(f, "  {instr}")?,
                }
            }
        }
        Ok(())
    }
}
