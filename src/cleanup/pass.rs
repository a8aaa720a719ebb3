//! The late instructions cleanup pass.
//!
//! Removes identical and redundant immediate or address loads to the same
//! register. The loads removed are typically the result of
//! rematerialization, or redundant frame addressing anchor points created
//! during frame index elimination.
//!
//! # Algorithm
//!
//! Blocks are visited in reverse postorder from the entry. Each block owns a
//! [`DefinitionTable`] of registers whose current value is known to be the
//! result of a particular candidate instruction:
//!
//! 1. **Seed**: a register is inherited from the predecessors when the first
//!    predecessor's table maps it to an instruction and every other
//!    predecessor's table maps it to an identical one.
//! 2. **Walk**: a write to the frame register forgets everything; a candidate
//!    identical to the known definition of its register is deleted (with
//!    kill-flag repair); otherwise every entry the instruction clobbers is
//!    forgotten and a candidate becomes the known definition of its register.
//!
//! Predecessors reached only through a back edge have empty tables when the
//! block is seeded, so loops inherit nothing across their header.

use tracing::{debug, debug_span, trace};

use crate::{
    cleanup::{
        candidate::classify,
        kills::{remove_redundant_def, KillRepair},
        table::{DefinitionTable, RegDefs},
    },
    compiler::{EventKind, EventLog, MachinePass, Statistic},
    machine::{BlockId, FunctionProperties, InstrId, MachineFunction, Reg, RegisterInfo, TargetInfo},
    Result,
};

/// Name of the pass; also the `tracing` target of its log output.
pub const PASS_NAME: &str = "machine-latecleanup";

/// Seeds the table of `block` with the definitions all its predecessors agree on.
///
/// Only entries of the first predecessor are considered; each is kept when
/// every other predecessor's table holds an identical instruction for the
/// same register. Returns the inherited entries in register order.
pub fn seed_from_predecessors(func: &MachineFunction, defs: &mut RegDefs, block: BlockId) -> Vec<(Reg, InstrId)> {
    let Some((&first, rest)) = func.block(block).and_then(|bb| bb.predecessors().split_first()) else {
        return Vec::new();
    };

    let inherited: Vec<(Reg, InstrId)> = defs
        .table(first)
        .iter()
        .filter(|&(reg, def)| {
            let Some(def) = func.instr(def) else {
                return false;
            };
            rest.iter().all(|&pred| {
                defs.table(pred)
                    .get(reg)
                    .and_then(|other| func.instr(other))
                    .is_some_and(|other| def.is_identical_to(other))
            })
        })
        .collect();

    let table = defs.table_mut(block);
    for &(reg, def) in &inherited {
        table.record(reg, def);
    }
    inherited
}

/// The late instructions cleanup pass.
///
/// # Examples
///
/// ```rust
/// use latecleanup::{
///     cleanup::LateInstrsCleanup,
///     compiler::EventLog,
///     machine::{FunctionBuilder, InstrFlags, TargetBuilder},
/// };
///
/// let target = TargetBuilder::new("toy")
///     .register("r0")
///     .register("sp")
///     .stack_pointer("sp")
///     .instruction("LI", InstrFlags::empty())
///     .build()?;
///
/// let mut func = FunctionBuilder::new("f", &target)
///     .block(0, |b| {
///         b.instr("LI", |i| i.def("r0").imm(1))
///             .instr("LI", |i| i.def("r0").imm(1))
///     })
///     .build()?;
///
/// let pass = LateInstrsCleanup::new();
/// assert!(pass.run_on_function(&mut func, &target, &EventLog::new()));
/// assert_eq!(func.instruction_count(), 1);
/// assert_eq!(pass.removed(), 1);
/// # Ok::<(), latecleanup::Error>(())
/// ```
#[derive(Debug)]
pub struct LateInstrsCleanup {
    removed: Statistic,
}

impl Default for LateInstrsCleanup {
    fn default() -> Self {
        Self::new()
    }
}

impl LateInstrsCleanup {
    /// Creates the pass with a zeroed removal counter.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            removed: Statistic::new(PASS_NAME, "Number of redundant instructions removed."),
        }
    }

    /// Number of instructions removed by this pass instance so far.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.removed.get()
    }

    /// Runs the cleanup on `func`.
    ///
    /// Returns `true` if any instruction was removed. The pass never fails:
    /// it improves the function or leaves it unchanged.
    ///
    /// # Panics
    ///
    /// Panics if a removed instruction's reused definition cannot be found
    /// on some path to it, which means the input violated the dominance the
    /// tables relied on.
    pub fn run_on_function(&self, func: &mut MachineFunction, target: &TargetInfo, events: &EventLog) -> bool {
        let _span = debug_span!(target: PASS_NAME, "run", function = func.name()).entered();

        let regs = target.registers();
        let frame_reg = target.frame_register(func);
        let mut defs = RegDefs::new(func.num_block_ids());
        let mut changed = false;

        for block in func.reverse_postorder() {
            for (_, def) in seed_from_predecessors(func, &mut defs, block) {
                if let Some(instr) = func.instr(def) {
                    let text = instr.display(regs).to_string();
                    debug!(target: PASS_NAME, %block, "Reusable instruction from pred(s): {text}");
                    events
                        .record(EventKind::DefinitionReused)
                        .function(func.name())
                        .block(block)
                        .message(text);
                }
            }
            changed |= self.process_block(func, regs, frame_reg, defs.table_mut(block), block, events);
        }

        changed
    }

    /// Walks `block` in program order, deleting redundant candidates and
    /// keeping `table` current.
    ///
    /// Returns `true` if an instruction was removed.
    pub fn process_block(
        &self,
        func: &mut MachineFunction,
        regs: &RegisterInfo,
        frame_reg: Reg,
        table: &mut DefinitionTable,
        block: BlockId,
        events: &EventLog,
    ) -> bool {
        let snapshot: Vec<InstrId> = func
            .block(block)
            .map(|bb| bb.instructions().to_vec())
            .unwrap_or_default();
        let mut changed = false;

        for id in snapshot {
            let Some(instr) = func.instr(id) else {
                continue;
            };

            if instr.modifies_register(frame_reg, regs) {
                if !table.is_empty() {
                    let text = instr.display(regs).to_string();
                    trace!(target: PASS_NAME, %block, dropped = table.len(), "Frame register modified: {text}");
                    events
                        .record(EventKind::DefinitionsInvalidated)
                        .function(func.name())
                        .block(block)
                        .message(text);
                }
                table.clear();
                continue;
            }

            let candidate = classify(instr, frame_reg);

            if let Some(reg) = candidate {
                let redundant = table
                    .get(reg)
                    .and_then(|def| func.instr(def))
                    .is_some_and(|def| instr.is_identical_to(def));
                if redundant {
                    let text = instr.display(regs).to_string();
                    debug!(target: PASS_NAME, %block, "Removing redundant instruction: {text}");
                    if let Some(repair) = remove_redundant_def(func, regs, id) {
                        self.removed.increment();
                        changed = true;
                        events
                            .record(EventKind::InstructionRemoved)
                            .function(func.name())
                            .block(block)
                            .message(text);
                        Self::record_repair(func, regs, reg, &repair, events);
                    }
                    continue;
                }
            }

            table.invalidate_clobbered(func, regs, id);

            if let Some(reg) = candidate {
                if let Some(instr) = func.instr(id) {
                    let text = instr.display(regs).to_string();
                    debug!(target: PASS_NAME, %block, "Found interesting instruction: {text}");
                    events
                        .record(EventKind::CandidateRecorded)
                        .function(func.name())
                        .block(block)
                        .message(text);
                }
                table.record(reg, id);
            }
        }

        changed
    }

    fn record_repair(func: &MachineFunction, regs: &RegisterInfo, reg: Reg, repair: &KillRepair, events: &EventLog) {
        for &id in &repair.kills_cleared {
            if let Some(instr) = func.instr(id) {
                let text = instr.display(regs).to_string();
                trace!(target: PASS_NAME, reg = %regs.display(reg), "Cleared kill flag: {text}");
                events
                    .record(EventKind::KillFlagCleared)
                    .function(func.name())
                    .block(instr.parent())
                    .message(text);
            }
        }
        for &block in &repair.live_ins_added {
            trace!(target: PASS_NAME, %block, reg = %regs.display(reg), "Added live-in");
            events
                .record(EventKind::LiveInAdded)
                .function(func.name())
                .block(block)
                .message(regs.display(reg));
        }
    }
}

impl MachinePass for LateInstrsCleanup {
    fn name(&self) -> &'static str {
        PASS_NAME
    }

    fn description(&self) -> &'static str {
        "Machine Late Instructions Cleanup Pass"
    }

    fn required_properties(&self) -> FunctionProperties {
        FunctionProperties::NO_VREGS
    }

    fn run_on_function(
        &self,
        func: &mut MachineFunction,
        target: &TargetInfo,
        events: &EventLog,
    ) -> Result<bool> {
        Ok(LateInstrsCleanup::run_on_function(self, func, target, events))
    }

    fn statistics(&self) -> Vec<&Statistic> {
        vec![&self.removed]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        machine::FunctionBuilder,
        test::{reg, toy_target},
    };

    fn opcodes(func: &MachineFunction, block: u32) -> Vec<String> {
        func.instructions(BlockId::new(block))
            .map(|(_, i)| i.desc().name().to_string())
            .collect()
    }

    #[test]
    fn test_pass_metadata() {
        let pass = LateInstrsCleanup::new();
        assert_eq!(MachinePass::name(&pass), "machine-latecleanup");
        assert_eq!(pass.required_properties(), FunctionProperties::NO_VREGS);
        assert_eq!(pass.removed(), 0);
        assert_eq!(pass.statistics().len(), 1);
    }

    #[test]
    fn test_seed_first_vs_rest() {
        let t = toy_target();
        let func = FunctionBuilder::new("f", &t)
            .block(0, |b| b.instr("BR", |i| i.mbb(2)))
            .block(1, |b| {
                b.instr("LI", |i| i.def("r1").imm(5))
                    .instr("LI", |i| i.def("r2").imm(1))
                    .instr("LI", |i| i.def("r3").imm(9))
            })
            .block(2, |b| {
                b.instr("LI", |i| i.def("r1").imm(5))
                    .instr("LI", |i| i.def("r2").imm(2))
            })
            .block(3, |b| b.instr("RET", |i| i))
            .edge(0, 1)
            .edge(0, 2)
            .edge(1, 3)
            .edge(2, 3)
            .build()
            .unwrap();
        let b1: Vec<_> = func.instructions(BlockId::new(1)).map(|(id, _)| id).collect();
        let b2: Vec<_> = func.instructions(BlockId::new(2)).map(|(id, _)| id).collect();

        let mut defs = RegDefs::new(func.num_block_ids());
        defs.table_mut(BlockId::new(1)).record(reg(&t, "r1"), b1[0]);
        defs.table_mut(BlockId::new(1)).record(reg(&t, "r2"), b1[1]);
        defs.table_mut(BlockId::new(1)).record(reg(&t, "r3"), b1[2]);
        defs.table_mut(BlockId::new(2)).record(reg(&t, "r1"), b2[0]);
        defs.table_mut(BlockId::new(2)).record(reg(&t, "r2"), b2[1]);

        let seeded = seed_from_predecessors(&func, &mut defs, BlockId::new(3));
        assert_eq!(seeded, vec![(reg(&t, "r1"), b1[0])]);
        assert_eq!(defs.table(BlockId::new(3)).get(reg(&t, "r1")), Some(b1[0]));

        assert!(seed_from_predecessors(&func, &mut defs, BlockId::new(0)).is_empty());
    }

    #[test]
    fn test_frame_write_invalidates() {
        let t = toy_target();
        let mut func = FunctionBuilder::new("f", &t)
            .with_frame_pointer(true)
            .block(0, |b| {
                b.instr("LA", |i| i.def("r2").read("fp").imm(8))
                    .instr("ADD", |i| i.def("fp").read("fp").imm(16))
                    .instr("LA", |i| i.def("r2").read("fp").imm(8))
                    .instr("RET", |i| i)
            })
            .build()
            .unwrap();

        let pass = LateInstrsCleanup::new();
        let events = EventLog::new();
        assert!(!pass.run_on_function(&mut func, &t, &events));
        assert_eq!(opcodes(&func, 0), vec!["LA", "ADD", "LA", "RET"]);
        assert_eq!(events.count(EventKind::DefinitionsInvalidated), 1);
    }

    #[test]
    fn test_clobber_forgets_entry() {
        let t = toy_target();
        let mut func = FunctionBuilder::new("f", &t)
            .block(0, |b| {
                b.instr("LI", |i| i.def("r1").imm(5))
                    .instr("ADD", |i| i.def("w0").read("r4").imm(1))
                    .instr("LI", |i| i.def("r1").imm(5))
            })
            .build()
            .unwrap();

        let pass = LateInstrsCleanup::new();
        assert!(!pass.run_on_function(&mut func, &t, &EventLog::new()));
        assert_eq!(func.instruction_count(), 3);
    }

    #[test]
    fn test_different_value_replaces_entry() {
        let t = toy_target();
        let mut func = FunctionBuilder::new("f", &t)
            .block(0, |b| {
                b.instr("LI", |i| i.def("r1").imm(5))
                    .instr("LI", |i| i.def("r1").imm(7))
                    .instr("LI", |i| i.def("r1").imm(7))
                    .instr("LI", |i| i.def("r1").imm(5))
            })
            .build()
            .unwrap();

        let pass = LateInstrsCleanup::new();
        let events = EventLog::new();
        assert!(pass.run_on_function(&mut func, &t, &events));
        assert_eq!(func.instruction_count(), 3);
        assert_eq!(pass.removed(), 1);
        assert_eq!(events.count(EventKind::InstructionRemoved), 1);
        assert_eq!(events.count(EventKind::CandidateRecorded), 3);
    }

    #[test]
    fn test_process_block_directly() {
        let t = toy_target();
        let mut func = FunctionBuilder::new("f", &t)
            .block(0, |b| {
                b.instr("LG", |i| i.def("r3").global("table", 16))
                    .instr("ST", |i| i.read("r1").kill("r3").imm(0))
                    .instr("LG", |i| i.def("r3").global("table", 16))
                    .instr("RET", |i| i.implicit_kill("r3"))
            })
            .build()
            .unwrap();
        let store = func.instructions(BlockId::new(0)).nth(1).map(|(id, _)| id).unwrap();

        let pass = LateInstrsCleanup::new();
        let events = EventLog::new();
        let mut table = DefinitionTable::new();
        let frame_reg = t.frame_register(&func);
        assert!(pass.process_block(&mut func, t.registers(), frame_reg, &mut table, BlockId::new(0), &events));

        assert_eq!(opcodes(&func, 0), vec!["LG", "ST", "RET"]);
        assert!(!func.instr(store).unwrap().operand(1).unwrap().is_kill());
        assert_eq!(table.get(reg(&t, "r3")).map(|id| func.instr(id).is_some()), Some(true));
        assert_eq!(events.count(EventKind::KillFlagCleared), 1);
    }
}
