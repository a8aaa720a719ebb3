//! Per-block tables of reusable definitions.
//!
//! A [`DefinitionTable`] maps a register to the candidate instruction whose
//! value the register is known to hold at the current point of a block.
//! Entries are stable [`InstrId`] handles into the function's arena, so a
//! table may refer to an instruction in another block (inherited from a
//! predecessor) without borrowing the function.

use std::collections::BTreeMap;

use crate::machine::{BlockId, InstrId, MachineFunction, Reg, RegisterInfo};

/// Register to defining-instruction map for one block.
///
/// Ordered by register so that iteration, and hence logging and predecessor
/// seeding, is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionTable {
    defs: BTreeMap<Reg, InstrId>,
}

impl DefinitionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The instruction known to define `reg`, if any.
    #[must_use]
    pub fn get(&self, reg: Reg) -> Option<InstrId> {
        self.defs.get(&reg).copied()
    }

    /// Records `instr` as the definition of `reg`, replacing any previous one.
    pub fn record(&mut self, reg: Reg, instr: InstrId) {
        self.defs.insert(reg, instr);
    }

    /// Forgets every definition.
    pub fn clear(&mut self) {
        self.defs.clear();
    }

    /// Forgets every definition whose register `clobber` writes.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_clobbered(&mut self, func: &MachineFunction, regs: &RegisterInfo, clobber: InstrId) -> usize {
        let Some(instr) = func.instr(clobber) else {
            return 0;
        };
        let before = self.defs.len();
        self.defs.retain(|&reg, _| !instr.modifies_register(reg, regs));
        before - self.defs.len()
    }

    /// Iterates over `(register, definition)` pairs in register order.
    pub fn iter(&self) -> impl Iterator<Item = (Reg, InstrId)> + '_ {
        self.defs.iter().map(|(&reg, &instr)| (reg, instr))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// The definition tables of every block of one function, for one run.
#[derive(Debug, Clone, Default)]
pub struct RegDefs {
    tables: Vec<DefinitionTable>,
}

impl RegDefs {
    /// Creates `block_count` empty tables.
    #[must_use]
    pub fn new(block_count: usize) -> Self {
        Self {
            tables: vec![DefinitionTable::new(); block_count],
        }
    }

    /// The table of `block`.
    ///
    /// # Panics
    ///
    /// Panics if `block` is outside the function the tables were sized for.
    #[must_use]
    pub fn table(&self, block: BlockId) -> &DefinitionTable {
        &self.tables[block.index()]
    }

    /// The table of `block`, mutably.
    ///
    /// # Panics
    ///
    /// Panics if `block` is outside the function the tables were sized for.
    pub fn table_mut(&mut self, block: BlockId) -> &mut DefinitionTable {
        &mut self.tables[block.index()]
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if there are no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        machine::FunctionBuilder,
        test::{reg, toy_target},
    };

    #[test]
    fn test_record_overwrites() {
        let mut table = DefinitionTable::new();
        let r = Reg::physical(1);
        table.record(r, InstrId::new(3));
        table.record(r, InstrId::new(7));
        assert_eq!(table.get(r), Some(InstrId::new(7)));
        assert_eq!(table.len(), 1);
        table.clear();
        assert!(table.is_empty());
    }

    #[test]
    fn test_invalidate_by_overlap() {
        let t = toy_target();
        let func = FunctionBuilder::new("f", &t)
            .block(0, |b| {
                b.instr("LI", |i| i.def("r0").imm(1))
                    .instr("LI", |i| i.def("r1").imm(2))
                    .instr("LI", |i| i.def("r2").imm(3))
                    .instr("LI", |i| i.def("w0").imm(0))
            })
            .build()
            .unwrap();
        let ids: Vec<_> = func.instructions(func.entry()).map(|(id, _)| id).collect();

        let mut table = DefinitionTable::new();
        table.record(reg(&t, "r0"), ids[0]);
        table.record(reg(&t, "r1"), ids[1]);
        table.record(reg(&t, "r2"), ids[2]);

        let removed = table.invalidate_clobbered(&func, t.registers(), ids[3]);
        assert_eq!(removed, 2);
        let left: Vec<_> = table.iter().collect();
        assert_eq!(left, vec![(reg(&t, "r2"), ids[2])]);
    }

    #[test]
    fn test_reg_defs_sized_per_block() {
        let mut defs = RegDefs::new(3);
        assert_eq!(defs.len(), 3);
        defs.table_mut(BlockId::new(2)).record(Reg::physical(1), InstrId::new(0));
        assert!(defs.table(BlockId::new(0)).is_empty());
        assert_eq!(defs.table(BlockId::new(2)).len(), 1);
    }
}
