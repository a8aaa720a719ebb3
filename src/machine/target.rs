//! Target description: register file, opcodes and frame registers.
//!
//! A [`TargetInfo`] is immutable once built and shared by every function
//! compiled for it. It is assembled with [`TargetBuilder`]:
//!
//! ```rust
//! use latecleanup::machine::{InstrFlags, TargetBuilder};
//!
//! let target = TargetBuilder::new("toy")
//!     .register("lo")
//!     .register("hi")
//!     .super_register("pair", &["lo", "hi"])
//!     .register("sp")
//!     .stack_pointer("sp")
//!     .instruction("LI", InstrFlags::empty())
//!     .build()?;
//!
//! let regs = target.registers();
//! let lo = target.register_named("lo")?;
//! let pair = target.register_named("pair")?;
//! assert!(regs.regs_overlap(lo, pair));
//! # Ok::<(), latecleanup::Error>(())
//! ```

use std::{collections::HashMap, sync::Arc};

use crate::{
    error::malformed_error,
    machine::{
        register::RegisterDesc, InstrDesc, InstrFlags, MachineFunction, Reg, RegisterInfo,
    },
    utils::BitSet,
    Error, Result,
};

/// Everything a late pass needs to know about the target.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    name: String,
    registers: RegisterInfo,
    opcodes: Vec<Arc<InstrDesc>>,
    opcode_names: HashMap<String, usize>,
    frame_pointer: Reg,
    stack_pointer: Reg,
}

impl TargetInfo {
    /// The target name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterInfo {
        &self.registers
    }

    /// Looks up a register by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRegister`] if the target has no such register.
    pub fn register_named(&self, name: &str) -> Result<Reg> {
        self.registers
            .find(name)
            .ok_or_else(|| Error::UnknownRegister(name.to_string()))
    }

    /// Looks up an opcode by mnemonic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOpcode`] if the target has no such opcode.
    pub fn opcode_named(&self, name: &str) -> Result<Arc<InstrDesc>> {
        self.opcode_names
            .get(name)
            .map(|&i| Arc::clone(&self.opcodes[i]))
            .ok_or_else(|| Error::UnknownOpcode(name.to_string()))
    }

    /// Iterates over all opcodes in opcode-number order.
    pub fn opcodes(&self) -> impl Iterator<Item = &InstrDesc> + '_ {
        self.opcodes.iter().map(AsRef::as_ref)
    }

    /// The dedicated frame pointer register, or `Reg::NONE`.
    #[must_use]
    pub const fn frame_pointer(&self) -> Reg {
        self.frame_pointer
    }

    /// The stack pointer register, or `Reg::NONE`.
    #[must_use]
    pub const fn stack_pointer(&self) -> Reg {
        self.stack_pointer
    }

    /// The register that frame-relative addresses are computed from in `func`.
    ///
    /// This is the frame pointer when the function keeps one, otherwise the
    /// stack pointer. Targets describing neither yield `Reg::NONE`.
    #[must_use]
    pub fn frame_register(&self, func: &MachineFunction) -> Reg {
        if func.frame_info().has_frame_pointer && self.frame_pointer.is_valid() {
            self.frame_pointer
        } else {
            self.stack_pointer
        }
    }
}

/// Builder for [`TargetInfo`].
///
/// Methods chain by value. The first error encountered is kept and reported
/// by [`build`](Self::build).
#[derive(Debug)]
pub struct TargetBuilder {
    name: String,
    registers: Vec<(String, Vec<usize>)>,
    num_units: usize,
    opcodes: Vec<(String, InstrFlags)>,
    frame_pointer: Option<String>,
    stack_pointer: Option<String>,
    error: Option<Error>,
}

impl TargetBuilder {
    /// Starts describing a target.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registers: Vec::new(),
            num_units: 0,
            opcodes: Vec::new(),
            frame_pointer: None,
            stack_pointer: None,
            error: None,
        }
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn unit_of(&self, name: &str) -> Option<&[usize]> {
        self.registers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, units)| units.as_slice())
    }

    fn add_register(&mut self, name: &str, units: Vec<usize>) {
        if self.unit_of(name).is_some() {
            self.fail(malformed_error!("register '{}' defined twice", name));
            return;
        }
        self.registers.push((name.to_string(), units));
    }

    /// Adds a register with a fresh register unit of its own.
    #[must_use]
    pub fn register(mut self, name: &str) -> Self {
        let unit = self.num_units;
        self.num_units += 1;
        self.add_register(name, vec![unit]);
        self
    }

    /// Adds a register covering the units of the named, already defined,
    /// sub-registers. It overlaps each of them.
    #[must_use]
    pub fn super_register(mut self, name: &str, subs: &[&str]) -> Self {
        let mut units = Vec::new();
        for sub in subs {
            match self.unit_of(sub) {
                Some(u) => units.extend_from_slice(u),
                None => {
                    self.fail(Error::UnknownRegister((*sub).to_string()));
                    return self;
                }
            }
        }
        if units.is_empty() {
            self.fail(malformed_error!("super-register '{}' has no sub-registers", name));
            return self;
        }
        self.add_register(name, units);
        self
    }

    /// Designates the frame pointer.
    #[must_use]
    pub fn frame_pointer(mut self, name: &str) -> Self {
        self.frame_pointer = Some(name.to_string());
        self
    }

    /// Designates the stack pointer.
    #[must_use]
    pub fn stack_pointer(mut self, name: &str) -> Self {
        self.stack_pointer = Some(name.to_string());
        self
    }

    /// Adds an opcode. Opcode numbers are assigned in insertion order.
    #[must_use]
    pub fn instruction(mut self, name: &str, flags: InstrFlags) -> Self {
        if self.opcodes.iter().any(|(n, _)| n == name) {
            self.fail(malformed_error!("opcode '{}' defined twice", name));
        } else {
            self.opcodes.push((name.to_string(), flags));
        }
        self
    }

    /// Finishes the description.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while building: a duplicate register
    /// or opcode, an unknown sub-register, or a frame/stack pointer name that
    /// is not a register of the target.
    pub fn build(self) -> Result<TargetInfo> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.opcodes.len() > usize::from(u16::MAX) {
            return Err(malformed_error!("too many opcodes: {}", self.opcodes.len()));
        }

        let descs = self
            .registers
            .into_iter()
            .map(|(name, units)| RegisterDesc {
                name,
                units: BitSet::from_indices(self.num_units, units),
            })
            .collect();
        let registers = RegisterInfo::new(descs, self.num_units);

        let lookup = |name: Option<String>| -> Result<Reg> {
            match name {
                Some(name) => registers.find(&name).ok_or(Error::UnknownRegister(name)),
                None => Ok(Reg::NONE),
            }
        };
        let frame_pointer = lookup(self.frame_pointer)?;
        let stack_pointer = lookup(self.stack_pointer)?;

        let mut opcodes = Vec::with_capacity(self.opcodes.len());
        let mut opcode_names = HashMap::with_capacity(self.opcodes.len());
        for (i, (name, flags)) in self.opcodes.into_iter().enumerate() {
            opcode_names.insert(name.clone(), i);
            opcodes.push(Arc::new(InstrDesc::new(i as u16, name, flags)));
        }

        Ok(TargetInfo {
            name: self.name,
            registers,
            opcodes,
            opcode_names,
            frame_pointer,
            stack_pointer,
        })
    }
}
