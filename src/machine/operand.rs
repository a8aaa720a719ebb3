//! Machine instruction operands.
//!
//! An operand is either a register reference carrying def/use annotations
//! ([`RegFlags`]) or one of a fixed set of non-register kinds: immediates,
//! symbolic addresses, frame indices, block references, register masks and
//! explicit memory references.

use std::{fmt, sync::Arc};

use bitflags::bitflags;
use strum::EnumDiscriminants;

use crate::{
    machine::{BlockId, Reg, RegisterInfo},
    utils::BitSet,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Annotations on a register operand.
    pub struct RegFlags: u8 {
        /// The operand writes the register; without it the operand is a use.
        const DEF = 0x01;
        /// The operand is implied by the opcode rather than written out.
        const IMPLICIT = 0x02;
        /// On a use: this is the last use of the register along this path.
        const KILL = 0x04;
        /// On a def: the value written is never read.
        const DEAD = 0x08;
        /// On a use: the value read is undefined, so the use does not read the register.
        const UNDEF = 0x10;
    }
}

/// A single operand of a [`MachineInstr`](crate::machine::MachineInstr).
///
/// Floating point immediates are stored as their IEEE-754 bit pattern so that
/// operand equality is exact and total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumDiscriminants)]
#[strum_discriminants(name(OperandKind), doc = "The kind of a machine operand.")]
#[strum_discriminants(derive(Hash, strum::EnumIter, strum::Display))]
pub enum MachineOperand {
    /// A register reference.
    Register {
        /// The register.
        reg: Reg,
        /// Def/use annotations.
        flags: RegFlags,
    },
    /// An integer immediate.
    Immediate(i64),
    /// A wide constant immediate.
    CImmediate(i128),
    /// A floating point immediate, stored as raw bits.
    FpImmediate(u64),
    /// An entry of the function's constant pool.
    ConstantPoolIndex {
        /// Constant pool slot.
        index: u32,
        /// Byte offset into the entry.
        offset: i64,
    },
    /// The address of a global value.
    GlobalAddress {
        /// Symbol name of the global.
        name: Arc<str>,
        /// Byte offset from the global's address.
        offset: i64,
    },
    /// The address of an external symbol.
    ExternalSymbol(Arc<str>),
    /// An abstract stack slot, not yet resolved to a frame offset.
    FrameIndex(i32),
    /// A basic block reference (branch target).
    Block(BlockId),
    /// The registers preserved across a call; every other register is clobbered.
    RegisterMask(Arc<BitSet>),
    /// An explicit memory reference.
    Memory {
        /// Byte offset of the access.
        offset: i64,
        /// Access size in bytes.
        size: u32,
    },
}

impl MachineOperand {
    /// Creates an explicit register definition.
    #[must_use]
    pub fn def(reg: Reg) -> Self {
        Self::Register {
            reg,
            flags: RegFlags::DEF,
        }
    }

    /// Creates an explicit register use.
    #[must_use]
    pub fn use_of(reg: Reg) -> Self {
        Self::Register {
            reg,
            flags: RegFlags::empty(),
        }
    }

    /// Creates a floating point immediate from its value.
    #[must_use]
    pub fn fp(value: f64) -> Self {
        Self::FpImmediate(value.to_bits())
    }

    /// Returns the kind of this operand.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use latecleanup::machine::{MachineOperand, OperandKind};
    ///
    /// assert_eq!(MachineOperand::Immediate(8).kind(), OperandKind::Immediate);
    /// assert_eq!(MachineOperand::fp(0.5).kind().to_string(), "FpImmediate");
    /// ```
    #[must_use]
    pub fn kind(&self) -> OperandKind {
        OperandKind::from(self)
    }

    /// Returns the register if this is a register operand.
    #[must_use]
    pub fn reg(&self) -> Option<Reg> {
        match self {
            Self::Register { reg, .. } => Some(*reg),
            _ => None,
        }
    }

    /// Returns the register annotations, empty for non-register operands.
    #[must_use]
    pub fn reg_flags(&self) -> RegFlags {
        match self {
            Self::Register { flags, .. } => *flags,
            _ => RegFlags::empty(),
        }
    }

    /// Returns `true` for register operands.
    #[must_use]
    pub fn is_reg(&self) -> bool {
        matches!(self, Self::Register { .. })
    }

    /// Returns `true` for register definitions.
    #[must_use]
    pub fn is_def(&self) -> bool {
        self.reg_flags().contains(RegFlags::DEF)
    }

    /// Returns `true` for register uses.
    #[must_use]
    pub fn is_use(&self) -> bool {
        self.is_reg() && !self.is_def()
    }

    /// Returns `true` for implicit register operands.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        self.reg_flags().contains(RegFlags::IMPLICIT)
    }

    /// Returns `true` for uses marked as the register's last use.
    #[must_use]
    pub fn is_kill(&self) -> bool {
        self.is_use() && self.reg_flags().contains(RegFlags::KILL)
    }

    /// Returns `true` for definitions whose value is never read.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.is_def() && self.reg_flags().contains(RegFlags::DEAD)
    }

    /// Returns `true` for register operands flagged `UNDEF`.
    #[must_use]
    pub fn is_undef(&self) -> bool {
        self.reg_flags().contains(RegFlags::UNDEF)
    }

    /// Returns `true` if this operand actually reads its register.
    ///
    /// Undef uses name a register without depending on its value.
    #[must_use]
    pub fn reads_reg(&self) -> bool {
        self.is_use() && !self.is_undef()
    }

    /// Sets or clears the kill flag on a register use. No-op on anything else.
    pub fn set_is_kill(&mut self, kill: bool) {
        if let Self::Register { flags, .. } = self {
            if !flags.contains(RegFlags::DEF) {
                flags.set(RegFlags::KILL, kill);
            }
        }
    }

    /// Returns `true` if this register mask operand clobbers `reg`.
    ///
    /// Only physical registers are affected by masks.
    #[must_use]
    pub fn clobbers_phys_reg(&self, reg: Reg) -> bool {
        match self {
            Self::RegisterMask(preserved) => reg.is_physical() && !preserved.contains(reg.index()),
            _ => false,
        }
    }

    /// Returns `true` if the operand is a constant or symbolic address that a
    /// register can be rematerialized from.
    #[must_use]
    pub fn is_materializable(&self) -> bool {
        matches!(
            self,
            Self::Immediate(_)
                | Self::CImmediate(_)
                | Self::FpImmediate(_)
                | Self::ConstantPoolIndex { .. }
                | Self::GlobalAddress { .. }
                | Self::ExternalSymbol(_)
        )
    }

    /// Structural operand identity.
    ///
    /// Register operands are identical when they name the same register and
    /// agree on being a definition. Liveness annotations (kill, dead, undef)
    /// and the implicit marker are ignored: they describe the surrounding code,
    /// not the value the operand denotes. Every other kind compares all fields.
    #[must_use]
    pub fn is_identical_to(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Register { reg: a, flags: fa }, Self::Register { reg: b, flags: fb }) => {
                a == b && fa.contains(RegFlags::DEF) == fb.contains(RegFlags::DEF)
            }
            _ => self == other,
        }
    }

    /// Formats the operand, naming registers through `regs`.
    #[must_use]
    pub fn display<'a>(&'a self, regs: &'a RegisterInfo) -> OperandDisplay<'a> {
        OperandDisplay {
            operand: self,
            regs: Some(regs),
        }
    }
}

impl fmt::Display for MachineOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        OperandDisplay {
            operand: self,
            regs: None,
        }
        .fmt(f)
    }
}

/// Helper returned by [`MachineOperand::display`].
pub struct OperandDisplay<'a> {
    operand: &'a MachineOperand,
    regs: Option<&'a RegisterInfo>,
}

impl fmt::Display for OperandDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            MachineOperand::Register { reg, flags } => {
                for (flag, text) in [
                    (RegFlags::IMPLICIT, "implicit "),
                    (RegFlags::DEF, "def "),
                    (RegFlags::KILL, "killed "),
                    (RegFlags::DEAD, "dead "),
                    (RegFlags::UNDEF, "undef "),
                ] {
                    if flags.contains(flag) && (flag != RegFlags::DEF || flags.contains(RegFlags::IMPLICIT)) {
                        f.write_str(text)?;
                    }
                }
                match self.regs {
                    Some(regs) => f.write_str(&regs.display(*reg)),
                    None => write!(f, "{reg}"),
                }
            }
            MachineOperand::Immediate(value) => write!(f, "{value}"),
            MachineOperand::CImmediate(value) => write!(f, "i128 {value}"),
            MachineOperand::FpImmediate(bits) => write!(f, "double {:e}", f64::from_bits(*bits)),
            MachineOperand::ConstantPoolIndex { index, offset } => {
                write!(f, "%const.{index}")?;
                write_offset(f, *offset)
            }
            MachineOperand::GlobalAddress { name, offset } => {
                write!(f, "@{name}")?;
                write_offset(f, *offset)
            }
            MachineOperand::ExternalSymbol(name) => write!(f, "&{name}"),
            MachineOperand::FrameIndex(index) => write!(f, "%stack.{index}"),
            MachineOperand::Block(block) => write!(f, "%{block}"),
            MachineOperand::RegisterMask(preserved) => {
                write!(f, "csr_mask({} preserved)", preserved.count())
            }
            MachineOperand::Memory { offset, size } => write!(f, "mem({size} @ {offset})"),
        }
    }
}

fn write_offset(f: &mut fmt::Formatter<'_>, offset: i64) -> fmt::Result {
    match offset {
        0 => Ok(()),
        o if o > 0 => write!(f, " + {o}"),
        o => write!(f, " - {}", o.unsigned_abs()),
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_identity_ignores_liveness_flags() {
        let r = Reg::physical(2);
        let plain = MachineOperand::use_of(r);
        let killed = MachineOperand::Register {
            reg: r,
            flags: RegFlags::KILL,
        };
        let undef = MachineOperand::Register {
            reg: r,
            flags: RegFlags::UNDEF | RegFlags::IMPLICIT,
        };

        assert!(plain.is_identical_to(&killed));
        assert!(plain.is_identical_to(&undef));
        assert!(!plain.is_identical_to(&MachineOperand::def(r)));
        assert!(!plain.is_identical_to(&MachineOperand::use_of(Reg::physical(3))));
    }

    #[test]
    fn test_identity_compares_non_register_fields() {
        let g1 = MachineOperand::GlobalAddress {
            name: Arc::from("table"),
            offset: 8,
        };
        let g2 = MachineOperand::GlobalAddress {
            name: Arc::from("table"),
            offset: 8,
        };
        let g3 = MachineOperand::GlobalAddress {
            name: Arc::from("table"),
            offset: 16,
        };

        assert!(g1.is_identical_to(&g2));
        assert!(!g1.is_identical_to(&g3));
        assert!(MachineOperand::fp(1.5).is_identical_to(&MachineOperand::fp(1.5)));
        assert!(!MachineOperand::fp(0.0).is_identical_to(&MachineOperand::fp(-0.0)));
        assert!(!MachineOperand::Immediate(5).is_identical_to(&MachineOperand::CImmediate(5)));
    }

    #[test]
    fn test_reads_reg_and_kill() {
        let r = Reg::physical(1);
        let mut op = MachineOperand::Register {
            reg: r,
            flags: RegFlags::KILL,
        };
        assert!(op.reads_reg());
        assert!(op.is_kill());

        op.set_is_kill(false);
        assert!(!op.is_kill());

        let undef = MachineOperand::Register {
            reg: r,
            flags: RegFlags::UNDEF,
        };
        assert!(!undef.reads_reg());

        let mut def = MachineOperand::def(r);
        def.set_is_kill(true);
        assert!(!def.reg_flags().contains(RegFlags::KILL));
        assert!(!def.reads_reg());
    }

    #[test]
    fn test_register_mask_clobbers() {
        let preserved = Arc::new(BitSet::from_indices(8, [2, 3]));
        let mask = MachineOperand::RegisterMask(preserved);

        assert!(mask.clobbers_phys_reg(Reg::physical(1)));
        assert!(!mask.clobbers_phys_reg(Reg::physical(2)));
        assert!(!mask.clobbers_phys_reg(Reg::virt(1)));
        assert!(!mask.clobbers_phys_reg(Reg::NONE));
    }

    #[test]
    fn test_materializable_kinds() {
        let materializable: Vec<OperandKind> = OperandKind::iter()
            .filter(|kind| {
                matches!(
                    kind,
                    OperandKind::Immediate
                        | OperandKind::CImmediate
                        | OperandKind::FpImmediate
                        | OperandKind::ConstantPoolIndex
                        | OperandKind::GlobalAddress
                        | OperandKind::ExternalSymbol
                )
            })
            .collect();
        assert_eq!(materializable.len(), 6);

        assert!(MachineOperand::Immediate(1).is_materializable());
        assert!(MachineOperand::ExternalSymbol(Arc::from("memcpy")).is_materializable());
        assert!(!MachineOperand::FrameIndex(0).is_materializable());
        assert!(!MachineOperand::Memory { offset: 0, size: 4 }.is_materializable());
        assert!(!MachineOperand::Block(BlockId::new(0)).is_materializable());
        assert!(!MachineOperand::use_of(Reg::physical(1)).is_materializable());
        assert_eq!(MachineOperand::Memory { offset: 0, size: 4 }.kind(), OperandKind::Memory);
        assert_eq!(OperandKind::GlobalAddress.to_string(), "GlobalAddress");
    }

    #[test]
    fn test_operand_display() {
        let killed = MachineOperand::Register {
            reg: Reg::physical(3),
            flags: RegFlags::KILL,
        };
        assert_eq!(killed.to_string(), "killed $r3");
        assert_eq!(MachineOperand::def(Reg::physical(3)).to_string(), "$r3");
        let implicit_def = MachineOperand::Register {
            reg: Reg::physical(3),
            flags: RegFlags::DEF | RegFlags::IMPLICIT,
        };
        assert_eq!(implicit_def.to_string(), "implicit def $r3");
        let global = MachineOperand::GlobalAddress {
            name: Arc::from("g"),
            offset: -4,
        };
        assert_eq!(global.to_string(), "@g - 4");
        assert_eq!(MachineOperand::Immediate(-7).to_string(), "-7");
    }
}
