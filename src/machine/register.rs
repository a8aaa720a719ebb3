//! Register identifiers and the register overlap relation.
//!
//! Registers are identified by a stable numeric key ([`Reg`]). Physical
//! registers are numbered densely from 1 by the target description, `0` is the
//! "no register" sentinel and bit 31 marks virtual registers.
//!
//! Aliasing between physical registers (a 64-bit register and its 32-bit
//! halves, for instance) is described with *register units*: every physical
//! register covers a set of units, and two registers overlap exactly when their
//! unit sets intersect. Plain equality is never enough to decide whether an
//! instruction touches a register; all such checks go through
//! [`RegisterInfo::regs_overlap`].

use std::fmt;

use crate::utils::BitSet;

/// A register identifier.
///
/// `Reg` is a `u32` newtype; it is `Copy` and ordered so it can key sorted
/// maps, which keeps per-block definition tables deterministic.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Reg(u32);

impl Reg {
    /// The absent register. Register operands holding it read and write nothing.
    pub const NONE: Reg = Reg(0);

    const VIRTUAL_BIT: u32 = 1 << 31;

    /// Creates a physical register from its target number.
    ///
    /// # Panics
    ///
    /// Panics if `number` is zero or collides with the virtual register space.
    #[must_use]
    pub const fn physical(number: u32) -> Self {
        assert!(number != 0 && number & Self::VIRTUAL_BIT == 0, "invalid physical register number");
        Reg(number)
    }

    /// Creates a virtual register with the given index.
    #[must_use]
    pub const fn virt(index: u32) -> Self {
        Reg((index & !Self::VIRTUAL_BIT) | Self::VIRTUAL_BIT)
    }

    /// Returns the raw key.
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the raw key as an index (physical register number, or the
    /// virtual index for virtual registers).
    #[must_use]
    pub const fn index(self) -> usize {
        (self.0 & !Self::VIRTUAL_BIT) as usize
    }

    /// Returns `true` unless this is [`Reg::NONE`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Returns `true` for virtual registers.
    #[must_use]
    pub const fn is_virtual(self) -> bool {
        self.0 & Self::VIRTUAL_BIT != 0
    }

    /// Returns `true` for valid, non-virtual registers.
    #[must_use]
    pub const fn is_physical(self) -> bool {
        self.is_valid() && !self.is_virtual()
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reg({self})")
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            write!(f, "$noreg")
        } else if self.is_virtual() {
            write!(f, "%{}", self.index())
        } else {
            write!(f, "$r{}", self.0)
        }
    }
}

/// Description of a single physical register.
#[derive(Debug, Clone)]
pub(crate) struct RegisterDesc {
    pub(crate) name: String,
    pub(crate) units: BitSet,
}

/// The target's register file: names and the overlap relation.
///
/// Built by [`TargetBuilder`](crate::machine::TargetBuilder). Slot 0 is the
/// `NONE` placeholder so that physical register numbers index `descs` directly.
#[derive(Debug, Clone)]
pub struct RegisterInfo {
    descs: Vec<RegisterDesc>,
    num_units: usize,
}

impl RegisterInfo {
    pub(crate) fn new(descs: Vec<RegisterDesc>, num_units: usize) -> Self {
        let mut all = Vec::with_capacity(descs.len() + 1);
        all.push(RegisterDesc {
            name: "noreg".to_string(),
            units: BitSet::new(num_units),
        });
        all.extend(descs);
        Self {
            descs: all,
            num_units,
        }
    }

    /// Number of physical registers.
    #[must_use]
    pub fn num_regs(&self) -> usize {
        self.descs.len() - 1
    }

    /// Number of register units.
    #[must_use]
    pub const fn num_units(&self) -> usize {
        self.num_units
    }

    /// Returns all physical registers in number order.
    pub fn registers(&self) -> impl Iterator<Item = Reg> + '_ {
        (1..self.descs.len()).map(|n| Reg(n as u32))
    }

    fn desc(&self, reg: Reg) -> Option<&RegisterDesc> {
        if reg.is_physical() {
            self.descs.get(reg.index())
        } else {
            None
        }
    }

    /// Returns the name of a physical register.
    #[must_use]
    pub fn name(&self, reg: Reg) -> Option<&str> {
        self.desc(reg).map(|d| d.name.as_str())
    }

    /// Looks up a physical register by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Reg> {
        self.descs
            .iter()
            .skip(1)
            .position(|d| d.name == name)
            .map(|i| Reg((i + 1) as u32))
    }

    /// Returns the register units covered by a physical register.
    #[must_use]
    pub fn units(&self, reg: Reg) -> Option<&BitSet> {
        self.desc(reg).map(|d| &d.units)
    }

    /// Returns `true` if `a` and `b` alias.
    ///
    /// Identical valid registers always overlap. Distinct physical registers
    /// overlap when they share a register unit. `NONE` overlaps nothing, and a
    /// virtual register only overlaps itself.
    #[must_use]
    pub fn regs_overlap(&self, a: Reg, b: Reg) -> bool {
        if !a.is_valid() || !b.is_valid() {
            return false;
        }
        if a == b {
            return true;
        }
        match (self.units(a), self.units(b)) {
            (Some(ua), Some(ub)) => ua.intersects(ub),
            _ => false,
        }
    }

    /// Returns every physical register that overlaps `reg`, including itself.
    pub fn aliases(&self, reg: Reg) -> impl Iterator<Item = Reg> + '_ {
        self.registers()
            .filter(move |&other| self.regs_overlap(reg, other))
    }

    /// Formats a register with its target name when known.
    #[must_use]
    pub fn display(&self, reg: Reg) -> String {
        match self.name(reg) {
            Some(name) => format!("${name}"),
            None => reg.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::toy_target;

    #[test]
    fn test_reg_kinds() {
        assert!(!Reg::NONE.is_valid());
        assert!(Reg::physical(3).is_physical());
        assert!(Reg::virt(3).is_virtual());
        assert!(!Reg::virt(3).is_physical());
        assert_eq!(Reg::virt(7).index(), 7);
        assert_ne!(Reg::virt(3), Reg::physical(3));
    }

    #[test]
    fn test_reg_display() {
        assert_eq!(Reg::NONE.to_string(), "$noreg");
        assert_eq!(Reg::physical(4).to_string(), "$r4");
        assert_eq!(Reg::virt(2).to_string(), "%2");
    }

    #[test]
    fn test_overlap_uses_units_not_equality() {
        let target = toy_target();
        let regs = target.registers();
        let r0 = regs.find("r0").unwrap();
        let r1 = regs.find("r1").unwrap();
        let w0 = regs.find("w0").unwrap();

        assert!(regs.regs_overlap(r0, r0));
        assert!(regs.regs_overlap(r0, w0));
        assert!(regs.regs_overlap(w0, r1));
        assert!(!regs.regs_overlap(r0, r1));
        assert!(!regs.regs_overlap(Reg::NONE, r0));
        assert!(!regs.regs_overlap(Reg::NONE, Reg::NONE));
    }

    #[test]
    fn test_virtual_overlaps_only_itself() {
        let target = toy_target();
        let regs = target.registers();
        let r0 = regs.find("r0").unwrap();

        assert!(regs.regs_overlap(Reg::virt(1), Reg::virt(1)));
        assert!(!regs.regs_overlap(Reg::virt(1), Reg::virt(2)));
        assert!(!regs.regs_overlap(Reg::virt(1), r0));
    }

    #[test]
    fn test_aliases_and_names() {
        let target = toy_target();
        let regs = target.registers();
        let w0 = regs.find("w0").unwrap();

        let aliases: Vec<_> = regs.aliases(w0).filter_map(|r| regs.name(r)).collect();
        assert_eq!(aliases, vec!["r0", "r1", "w0"]);
        assert_eq!(regs.display(w0), "$w0");
        assert_eq!(regs.display(Reg::virt(9)), "%9");
        assert!(regs.find("nope").is_none());
    }
}
