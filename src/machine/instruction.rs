//! Machine instructions and opcode descriptors.
//!
//! An instruction is an opcode descriptor shared with the target
//! ([`InstrDesc`]), an ordered operand list and the block it lives in. The
//! queries here are the ones late passes need to reason about an instruction
//! without knowing its target semantics: which registers it writes (by
//! overlap), whether it may be moved or deleted, and whether two instructions
//! are the same computation.

use std::{fmt, sync::Arc};

use bitflags::bitflags;

use crate::machine::{BlockId, MachineOperand, Reg, RegisterInfo};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Static properties of an opcode.
    pub struct InstrFlags: u32 {
        /// May read memory.
        const MAY_LOAD = 0x0001;
        /// May write memory.
        const MAY_STORE = 0x0002;
        /// A call.
        const CALL = 0x0004;
        /// Ends a basic block.
        const TERMINATOR = 0x0008;
        /// A branch.
        const BRANCH = 0x0010;
        /// A function return.
        const RETURN = 0x0020;
        /// Has effects the operand list does not describe.
        const UNMODELED_SIDE_EFFECTS = 0x0040;
        /// Placeholder that defines a register without computing anything.
        const IMPLICIT_DEF = 0x0080;
        /// Inline assembly.
        const INLINE_ASM = 0x0100;
        /// A phi node.
        const PHI = 0x0200;
        /// Debug value annotation.
        const DEBUG_VALUE = 0x0400;
        /// Position label (EH label, GC label, ...).
        const LABEL = 0x0800;
        /// Loads may not be folded across this instruction.
        const LOAD_FOLD_BARRIER = 0x1000;
        /// The load reads invariant, dereferenceable memory.
        const INVARIANT_LOAD = 0x2000;
        /// The memory access is volatile or atomic.
        const ORDERED_MEMORY = 0x4000;
    }
}

/// An opcode as described by the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrDesc {
    opcode: u16,
    name: String,
    flags: InstrFlags,
}

impl InstrDesc {
    pub(crate) fn new(opcode: u16, name: impl Into<String>, flags: InstrFlags) -> Self {
        Self {
            opcode,
            name: name.into(),
            flags,
        }
    }

    /// The target opcode number.
    #[must_use]
    pub const fn opcode(&self) -> u16 {
        self.opcode
    }

    /// The mnemonic.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The opcode's static properties.
    #[must_use]
    pub const fn flags(&self) -> InstrFlags {
        self.flags
    }
}

/// A machine instruction.
#[derive(Debug, Clone)]
pub struct MachineInstr {
    desc: Arc<InstrDesc>,
    operands: Vec<MachineOperand>,
    parent: BlockId,
}

impl MachineInstr {
    /// Creates an instruction placed in `parent`.
    #[must_use]
    pub fn new(desc: Arc<InstrDesc>, operands: Vec<MachineOperand>, parent: BlockId) -> Self {
        Self {
            desc,
            operands,
            parent,
        }
    }

    /// The opcode descriptor.
    #[must_use]
    pub fn desc(&self) -> &InstrDesc {
        &self.desc
    }

    /// The target opcode number.
    #[must_use]
    pub fn opcode(&self) -> u16 {
        self.desc.opcode
    }

    /// The block containing this instruction.
    #[must_use]
    pub const fn parent(&self) -> BlockId {
        self.parent
    }

    /// The operands in order.
    #[must_use]
    pub fn operands(&self) -> &[MachineOperand] {
        &self.operands
    }

    /// Mutable access to the operands, for annotation updates.
    pub fn operands_mut(&mut self) -> &mut [MachineOperand] {
        &mut self.operands
    }

    /// Returns the operand at `index`.
    #[must_use]
    pub fn operand(&self, index: usize) -> Option<&MachineOperand> {
        self.operands.get(index)
    }

    /// Number of operands.
    #[must_use]
    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    fn has(&self, flag: InstrFlags) -> bool {
        self.desc.flags.contains(flag)
    }

    /// Returns `true` for implicit-definition placeholders.
    #[must_use]
    pub fn is_implicit_def(&self) -> bool {
        self.has(InstrFlags::IMPLICIT_DEF)
    }

    /// Returns `true` for inline assembly.
    #[must_use]
    pub fn is_inline_asm(&self) -> bool {
        self.has(InstrFlags::INLINE_ASM)
    }

    /// Returns `true` for block terminators.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.has(InstrFlags::TERMINATOR)
    }

    /// Returns `true` for calls.
    #[must_use]
    pub fn is_call(&self) -> bool {
        self.has(InstrFlags::CALL)
    }

    /// Returns `true` if the instruction may read memory.
    #[must_use]
    pub fn may_load(&self) -> bool {
        self.has(InstrFlags::MAY_LOAD)
    }

    /// Returns `true` if the instruction may write memory.
    #[must_use]
    pub fn may_store(&self) -> bool {
        self.has(InstrFlags::MAY_STORE)
    }

    /// Returns `true` if the instruction has effects beyond its operands.
    #[must_use]
    pub fn has_unmodeled_side_effects(&self) -> bool {
        self.has(InstrFlags::UNMODELED_SIDE_EFFECTS) || self.is_inline_asm()
    }

    /// Returns `true` if it is safe to move this instruction.
    ///
    /// `saw_store` carries whether a store was seen between the original and
    /// the new position; it is set when this instruction is itself a store or
    /// otherwise orders memory. A plain load is only movable when no store
    /// was seen, an invariant load always is.
    pub fn is_safe_to_move(&self, saw_store: &mut bool) -> bool {
        if self.may_store()
            || self.is_call()
            || self.has(InstrFlags::PHI)
            || (self.may_load() && self.has(InstrFlags::ORDERED_MEMORY))
        {
            *saw_store = true;
            return false;
        }

        if self.has(InstrFlags::LABEL)
            || self.has(InstrFlags::DEBUG_VALUE)
            || self.is_terminator()
            || self.has_unmodeled_side_effects()
            || self.has(InstrFlags::LOAD_FOLD_BARRIER)
        {
            return false;
        }

        if self.may_load() && !self.has(InstrFlags::INVARIANT_LOAD) {
            return !*saw_store;
        }

        true
    }

    /// Returns `true` if the instruction writes a register overlapping `reg`,
    /// through a register definition or a clobbering register mask.
    #[must_use]
    pub fn modifies_register(&self, reg: Reg, regs: &RegisterInfo) -> bool {
        if !reg.is_valid() {
            return false;
        }
        self.operands.iter().any(|op| match op {
            MachineOperand::Register { reg: r, .. } => op.is_def() && regs.regs_overlap(*r, reg),
            MachineOperand::RegisterMask(_) => op.clobbers_phys_reg(reg),
            _ => false,
        })
    }

    /// Returns `true` if the instruction reads a register overlapping `reg`.
    #[must_use]
    pub fn reads_register(&self, reg: Reg, regs: &RegisterInfo) -> bool {
        self.operands
            .iter()
            .any(|op| op.reads_reg() && op.reg().is_some_and(|r| regs.regs_overlap(r, reg)))
    }

    /// Returns every register this instruction defines.
    pub fn defs(&self) -> impl Iterator<Item = Reg> + '_ {
        self.operands
            .iter()
            .filter(|op| op.is_def())
            .filter_map(MachineOperand::reg)
    }

    /// Returns `true` if `self` and `other` compute the same thing.
    ///
    /// Same opcode and the same number of operands, pairwise
    /// [identical](MachineOperand::is_identical_to). Kill and dead flags
    /// are not part of the comparison.
    #[must_use]
    pub fn is_identical_to(&self, other: &Self) -> bool {
        self.opcode() == other.opcode()
            && self.operands.len() == other.operands.len()
            && self
                .operands
                .iter()
                .zip(&other.operands)
                .all(|(a, b)| a.is_identical_to(b))
    }

    pub(crate) fn set_parent(&mut self, parent: BlockId) {
        self.parent = parent;
    }

    /// Formats the instruction, naming registers through `regs`.
    #[must_use]
    pub fn display<'a>(&'a self, regs: &'a RegisterInfo) -> InstrDisplay<'a> {
        InstrDisplay {
            instr: self,
            regs: Some(regs),
        }
    }
}

impl fmt::Display for MachineInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        InstrDisplay {
            instr: self,
            regs: None,
        }
        .fmt(f)
    }
}

/// Helper returned by [`MachineInstr::display`].
///
/// Explicit leading definitions are printed on the left of `=`, the way
/// machine IR dumps usually read: `$r1 = LI 42`.
pub struct InstrDisplay<'a> {
    instr: &'a MachineInstr,
    regs: Option<&'a RegisterInfo>,
}

impl fmt::Display for InstrDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_op = |f: &mut fmt::Formatter<'_>, op: &MachineOperand| match self.regs {
            Some(regs) => write!(f, "{}", op.display(regs)),
            None => write!(f, "{op}"),
        };

        let operands = self.instr.operands();
        let num_defs = operands
            .iter()
            .take_while(|op| op.is_def() && !op.is_implicit())
            .count();

        for (i, op) in operands[..num_defs].iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_op(f, op)?;
        }
        if num_defs > 0 {
            f.write_str(" = ")?;
        }
        f.write_str(self.instr.desc.name())?;
        for (i, op) in operands[num_defs..].iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            write_op(f, op)?;
        }
        Ok(())
    }
}
