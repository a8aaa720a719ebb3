//! Closure-style construction of machine functions.
//!
//! Registers and opcodes are referred to by name and resolved against a
//! [`TargetInfo`]. A name of the form `%N` denotes virtual register `N` and
//! `noreg` denotes [`Reg::NONE`]. Lookup failures are collected while building
//! and reported once by [`FunctionBuilder::build`].
//!
//! ```rust
//! use latecleanup::machine::{FunctionBuilder, InstrFlags, TargetBuilder};
//!
//! let target = TargetBuilder::new("toy")
//!     .register("r0")
//!     .register("fp")
//!     .frame_pointer("fp")
//!     .instruction("LA", InstrFlags::empty())
//!     .instruction("BR", InstrFlags::TERMINATOR | InstrFlags::BRANCH)
//!     .build()?;
//!
//! let func = FunctionBuilder::new("f", &target)
//!     .with_frame_pointer(true)
//!     .block(0, |b| {
//!         b.instr("LA", |i| i.def("r0").read("fp").imm(8))
//!             .instr("BR", |i| i.mbb(1))
//!     })
//!     .block(1, |b| b.live_in("r0"))
//!     .edge(0, 1)
//!     .build()?;
//!
//! assert_eq!(func.instruction_count(), 2);
//! # Ok::<(), latecleanup::Error>(())
//! ```

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    error::malformed_error,
    machine::{
        BlockId, FrameInfo, FunctionAttributes, FunctionProperties, MachineFunction,
        MachineInstr, MachineOperand, Reg, RegFlags, TargetInfo,
    },
    utils::BitSet,
    Error, Result,
};

fn resolve(target: &TargetInfo, name: &str) -> Result<Reg> {
    if name == "noreg" {
        return Ok(Reg::NONE);
    }
    if let Some(index) = name.strip_prefix('%') {
        return index
            .parse::<u32>()
            .map(Reg::virt)
            .map_err(|_| Error::UnknownRegister(name.to_string()));
    }
    target.register_named(name)
}

/// Builds a [`MachineFunction`] against a target.
pub struct FunctionBuilder<'t> {
    name: String,
    target: &'t TargetInfo,
    frame: FrameInfo,
    attributes: FunctionAttributes,
    blocks: BTreeMap<u32, BlockBuilder<'t>>,
    edges: Vec<(u32, u32)>,
    error: Option<Error>,
}

impl<'t> FunctionBuilder<'t> {
    /// Starts building a function named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, target: &'t TargetInfo) -> Self {
        Self {
            name: name.into(),
            target,
            frame: FrameInfo::default(),
            attributes: FunctionAttributes::empty(),
            blocks: BTreeMap::new(),
            edges: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Sets whether the function keeps a dedicated frame pointer.
    #[must_use]
    pub fn with_frame_pointer(mut self, enabled: bool) -> Self {
        self.frame.has_frame_pointer = enabled;
        self
    }

    /// Sets the function attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: FunctionAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Defines block `number`, filling it through `f`.
    #[must_use]
    pub fn block<F>(mut self, number: u32, f: F) -> Self
    where
        F: FnOnce(BlockBuilder<'t>) -> BlockBuilder<'t>,
    {
        if self.blocks.contains_key(&number) {
            self.fail(Error::DuplicateBlock(BlockId::new(number)));
            return self;
        }
        let block = f(BlockBuilder::new(self.target, BlockId::new(number)));
        self.blocks.insert(number, block);
        self
    }

    /// Adds a CFG edge. Predecessor order follows the order edges are added.
    #[must_use]
    pub fn edge(mut self, from: u32, to: u32) -> Self {
        self.edges.push((from, to));
        self
    }

    /// Validates and assembles the function.
    ///
    /// Sets [`FunctionProperties::NO_VREGS`] when no operand names a virtual
    /// register.
    ///
    /// # Errors
    ///
    /// Returns the first name lookup failure, [`Error::DuplicateBlock`] for
    /// a block defined twice, [`Error::UnknownBlock`] for an edge to or from
    /// an undefined block, and [`Error::Malformed`] when the function has no
    /// blocks or the block numbers are not contiguous from zero.
    pub fn build(mut self) -> Result<MachineFunction> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }
        if self.blocks.is_empty() {
            return Err(malformed_error!("function '{}' has no blocks", self.name));
        }
        for (expected, &number) in self.blocks.keys().enumerate() {
            if number as usize != expected {
                return Err(malformed_error!(
                    "function '{}': block numbers must be contiguous, bb.{} is missing",
                    self.name,
                    expected
                ));
            }
        }

        let mut func = MachineFunction::new(self.name, self.blocks.len());
        func.set_frame_info(self.frame);
        func.set_attributes(self.attributes);

        for block in self.blocks.into_values() {
            if let Some(error) = block.error {
                return Err(error);
            }
            let id = block.id;
            for instr in block.instrs {
                func.push_instr(id, instr)?;
            }
            if let Some(bb) = func.block_mut(id) {
                for reg in block.live_ins {
                    bb.add_live_in(reg);
                }
            }
        }

        for (from, to) in self.edges {
            func.add_edge(BlockId::new(from), BlockId::new(to))?;
        }

        if !func.has_virtual_registers() {
            func.set_properties(FunctionProperties::NO_VREGS);
        }
        Ok(func)
    }
}

/// Fills one block of a [`FunctionBuilder`].
pub struct BlockBuilder<'t> {
    target: &'t TargetInfo,
    id: BlockId,
    instrs: Vec<MachineInstr>,
    live_ins: Vec<Reg>,
    error: Option<Error>,
}

impl<'t> BlockBuilder<'t> {
    fn new(target: &'t TargetInfo, id: BlockId) -> Self {
        Self {
            target,
            id,
            instrs: Vec::new(),
            live_ins: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Appends an instruction with opcode `opcode`, whose operands are added by `f`.
    #[must_use]
    pub fn instr<F>(mut self, opcode: &str, f: F) -> Self
    where
        F: FnOnce(InstrBuilder<'t>) -> InstrBuilder<'t>,
    {
        let desc = match self.target.opcode_named(opcode) {
            Ok(desc) => desc,
            Err(e) => {
                self.fail(e);
                return self;
            }
        };
        let built = f(InstrBuilder::new(self.target));
        match built.error {
            Some(e) => self.fail(e),
            None => self.instrs.push(MachineInstr::new(desc, built.operands, self.id)),
        }
        self
    }

    /// Marks a register as live on entry to the block.
    #[must_use]
    pub fn live_in(mut self, name: &str) -> Self {
        match resolve(self.target, name) {
            Ok(reg) => self.live_ins.push(reg),
            Err(e) => self.fail(e),
        }
        self
    }
}

/// Collects the operands of one instruction.
pub struct InstrBuilder<'t> {
    target: &'t TargetInfo,
    operands: Vec<MachineOperand>,
    error: Option<Error>,
}

impl<'t> InstrBuilder<'t> {
    fn new(target: &'t TargetInfo) -> Self {
        Self {
            target,
            operands: Vec::new(),
            error: None,
        }
    }

    /// Appends an operand as is.
    #[must_use]
    pub fn operand(mut self, operand: MachineOperand) -> Self {
        self.operands.push(operand);
        self
    }

    /// Appends a register operand with explicit flags.
    #[must_use]
    pub fn reg(mut self, name: &str, flags: RegFlags) -> Self {
        match resolve(self.target, name) {
            Ok(reg) => self.operands.push(MachineOperand::Register { reg, flags }),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
            }
        }
        self
    }

    /// Explicit definition.
    #[must_use]
    pub fn def(self, name: &str) -> Self {
        self.reg(name, RegFlags::DEF)
    }

    /// Explicit definition whose value is never read.
    #[must_use]
    pub fn dead_def(self, name: &str) -> Self {
        self.reg(name, RegFlags::DEF | RegFlags::DEAD)
    }

    /// Implicit definition.
    #[must_use]
    pub fn implicit_def(self, name: &str) -> Self {
        self.reg(name, RegFlags::DEF | RegFlags::IMPLICIT)
    }

    /// Explicit use.
    #[must_use]
    pub fn read(self, name: &str) -> Self {
        self.reg(name, RegFlags::empty())
    }

    /// Explicit use that is the last use of the register.
    #[must_use]
    pub fn kill(self, name: &str) -> Self {
        self.reg(name, RegFlags::KILL)
    }

    /// Implicit use.
    #[must_use]
    pub fn implicit_use(self, name: &str) -> Self {
        self.reg(name, RegFlags::IMPLICIT)
    }

    /// Implicit use that is the last use of the register.
    #[must_use]
    pub fn implicit_kill(self, name: &str) -> Self {
        self.reg(name, RegFlags::IMPLICIT | RegFlags::KILL)
    }

    /// Use of an undefined value; it does not read the register.
    #[must_use]
    pub fn undef(self, name: &str) -> Self {
        self.reg(name, RegFlags::UNDEF)
    }

    /// Integer immediate.
    #[must_use]
    pub fn imm(self, value: i64) -> Self {
        self.operand(MachineOperand::Immediate(value))
    }

    /// Wide constant immediate.
    #[must_use]
    pub fn cimm(self, value: i128) -> Self {
        self.operand(MachineOperand::CImmediate(value))
    }

    /// Floating point immediate.
    #[must_use]
    pub fn fpimm(self, value: f64) -> Self {
        self.operand(MachineOperand::fp(value))
    }

    /// Constant pool entry.
    #[must_use]
    pub fn cpi(self, index: u32, offset: i64) -> Self {
        self.operand(MachineOperand::ConstantPoolIndex { index, offset })
    }

    /// Global address.
    #[must_use]
    pub fn global(self, name: &str, offset: i64) -> Self {
        self.operand(MachineOperand::GlobalAddress {
            name: Arc::from(name),
            offset,
        })
    }

    /// External symbol.
    #[must_use]
    pub fn symbol(self, name: &str) -> Self {
        self.operand(MachineOperand::ExternalSymbol(Arc::from(name)))
    }

    /// Abstract stack slot.
    #[must_use]
    pub fn frame_index(self, index: i32) -> Self {
        self.operand(MachineOperand::FrameIndex(index))
    }

    /// Block reference.
    #[must_use]
    pub fn mbb(self, number: u32) -> Self {
        self.operand(MachineOperand::Block(BlockId::new(number)))
    }

    /// Register mask preserving the named registers; all others are clobbered.
    #[must_use]
    pub fn regmask(mut self, preserved: &[&str]) -> Self {
        let regs = self.target.registers();
        let mut set = BitSet::new(regs.num_regs() + 1);
        for name in preserved {
            match self.target.register_named(name) {
                Ok(reg) => {
                    set.insert(reg.index());
                }
                Err(e) => {
                    if self.error.is_none() {
                        self.error = Some(e);
                    }
                    return self;
                }
            }
        }
        self.operand(MachineOperand::RegisterMask(Arc::new(set)))
    }

    /// Explicit memory reference.
    #[must_use]
    pub fn mem(self, offset: i64, size: u32) -> Self {
        self.operand(MachineOperand::Memory { offset, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{reg, toy_target};

    #[test]
    fn test_build_diamond() {
        let t = toy_target();
        let func = FunctionBuilder::new("diamond", &t)
            .block(0, |b| b.instr("LI", |i| i.def("r1").imm(5)).instr("BR", |i| i.mbb(2)))
            .block(1, |b| b.instr("LI", |i| i.def("r1").imm(5)))
            .block(2, |b| b.live_in("r1").instr("RET", |i| i.implicit_kill("r1")))
            .edge(0, 1)
            .edge(0, 2)
            .edge(1, 2)
            .build()
            .unwrap();

        assert_eq!(func.num_block_ids(), 3);
        assert_eq!(func.instruction_count(), 4);
        assert!(func.properties().contains(FunctionProperties::NO_VREGS));

        let join = func.block(BlockId::new(2)).unwrap();
        assert_eq!(join.predecessors(), &[BlockId::new(0), BlockId::new(1)]);
        assert!(join.is_live_in(reg(&t, "r1")));

        let (_, ret) = func.instructions(BlockId::new(2)).next().unwrap();
        assert!(ret.operand(0).unwrap().is_kill());
        assert_eq!(ret.parent(), BlockId::new(2));
    }

    #[test]
    fn test_virtual_and_sentinel_registers() {
        let t = toy_target();
        let func = FunctionBuilder::new("v", &t)
            .block(0, |b| b.instr("ADD", |i| i.def("%3").read("noreg").imm(1)))
            .build()
            .unwrap();

        assert!(!func.properties().contains(FunctionProperties::NO_VREGS));
        let (_, add) = func.instructions(func.entry()).next().unwrap();
        assert_eq!(add.operand(0).unwrap().reg(), Some(Reg::virt(3)));
        assert_eq!(add.operand(1).unwrap().reg(), Some(Reg::NONE));
    }

    #[test]
    fn test_errors() {
        let t = toy_target();

        let r = FunctionBuilder::new("f", &t).block(0, |b| b.instr("NOP", |i| i)).build();
        assert!(matches!(r, Err(Error::UnknownOpcode(n)) if n == "NOP"));

        let r = FunctionBuilder::new("f", &t)
            .block(0, |b| b.instr("LI", |i| i.def("q7").imm(0)))
            .build();
        assert!(matches!(r, Err(Error::UnknownRegister(n)) if n == "q7"));

        let r = FunctionBuilder::new("f", &t).block(0, |b| b).block(0, |b| b).build();
        assert!(matches!(r, Err(Error::DuplicateBlock(b)) if b == BlockId::new(0)));

        let r = FunctionBuilder::new("f", &t).block(0, |b| b).edge(0, 4).build();
        assert!(matches!(r, Err(Error::UnknownBlock(b)) if b == BlockId::new(4)));

        let r = FunctionBuilder::new("f", &t).block(0, |b| b).block(2, |b| b).build();
        assert!(matches!(r, Err(Error::Malformed { .. })));

        let r = FunctionBuilder::new("f", &t).build();
        assert!(matches!(r, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_regmask_preserves_named() {
        let t = toy_target();
        let func = FunctionBuilder::new("f", &t)
            .block(0, |b| b.instr("CALL", |i| i.global("callee", 0).regmask(&["r6", "r7", "fp", "sp"])))
            .build()
            .unwrap();

        let (_, call) = func.instructions(func.entry()).next().unwrap();
        let regs = t.registers();
        assert!(call.modifies_register(reg(&t, "r0"), regs));
        assert!(!call.modifies_register(reg(&t, "r6"), regs));
        assert!(!call.modifies_register(reg(&t, "fp"), regs));
    }
}
