//! Removal of redundant definitions and kill-flag repair.
//!
//! Deleting a redundant `R = ...` extends the live range of the earlier,
//! identical definition of `R` up to every use the deleted instruction used
//! to feed. Any use between the two that was marked as the last use (a kill)
//! is no longer last, and every block boundary the extended range crosses
//! must list `R` as live-in.
//!
//! Rather than maintaining liveness, the repair walks backwards from the
//! deleted instruction until it meets the nearest use or definition of `R`
//! on each path, continuing into predecessors when a block start is reached.

use crate::{
    machine::{BlockId, InstrId, MachineFunction, MachineOperand, Reg, RegisterInfo},
    utils::BitSet,
};

/// What a backward repair walk changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillRepair {
    /// Instructions that had a kill flag on the register cleared.
    pub kills_cleared: Vec<InstrId>,
    /// Blocks that gained the register as a live-in.
    pub live_ins_added: Vec<BlockId>,
    /// Number of blocks scanned, including the starting block.
    pub blocks_scanned: usize,
}

impl KillRepair {
    /// Returns `true` if the walk modified anything.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.kills_cleared.is_empty() || !self.live_ins_added.is_empty()
    }
}

/// Clears the kill flag of the nearest earlier reads of `reg` above
/// `position` in `block`, continuing into predecessors as needed.
///
/// Each path stops at the first instruction that defines or reads a register
/// overlapping `reg`. All overlapping reads in that instruction lose their
/// kill flag, so an implicit kill of a super-register is cleared along with
/// the explicit use. Undefined uses do not read the register and are passed
/// over. Every block whose start is reached gets `reg` as a live-in.
///
/// # Panics
///
/// Panics if a block whose start is reached has no predecessors: the
/// redundant instruction was then not dominated by an earlier definition.
pub fn clear_kills_for_def(
    func: &mut MachineFunction,
    regs: &RegisterInfo,
    reg: Reg,
    block: BlockId,
    position: usize,
) -> KillRepair {
    let mut repair = KillRepair::default();
    let mut visited = BitSet::new(func.num_block_ids());
    visited.insert(block.index());

    // (block, scan end); `None` scans the whole block.
    let mut worklist = vec![(block, Some(position))];

    while let Some((current, end)) = worklist.pop() {
        repair.blocks_scanned += 1;

        let ids: Vec<InstrId> = func
            .block(current)
            .map(|b| b.instructions().to_vec())
            .unwrap_or_default();
        let end = end.map_or(ids.len(), |e| e.min(ids.len()));

        if scan_backward(func, regs, reg, &ids[..end], &mut repair) {
            continue;
        }

        let Some(bb) = func.block_mut(current) else {
            continue;
        };
        if bb.add_live_in(reg) {
            repair.live_ins_added.push(current);
        }
        assert!(
            !bb.pred_empty(),
            "no definition of {reg} found above {current}: block has no predecessors"
        );

        // Reverse so that the first predecessor is scanned first.
        for &pred in bb.predecessors().iter().rev() {
            if visited.insert(pred.index()) {
                worklist.push((pred, None));
            }
        }
    }

    repair
}

/// Scans `ids` from the back. Returns `true` if the walk ends in this block.
fn scan_backward(
    func: &mut MachineFunction,
    regs: &RegisterInfo,
    reg: Reg,
    ids: &[InstrId],
    repair: &mut KillRepair,
) -> bool {
    for &id in ids.iter().rev() {
        let Some(instr) = func.instr_mut(id) else {
            continue;
        };

        let mut found = false;
        let mut cleared = false;
        for op in instr.operands_mut() {
            if !op.reg().is_some_and(|r| regs.regs_overlap(r, reg)) {
                continue;
            }
            if op.is_def() {
                return true;
            }
            if op.reads_reg() {
                cleared |= op.is_kill();
                op.set_is_kill(false);
                found = true;
            }
        }

        if cleared {
            repair.kills_cleared.push(id);
        }
        if found {
            return true;
        }
    }
    false
}

/// Erases the redundant definition `id` after repairing kill flags and
/// live-ins for the register it defines.
///
/// Returns `None`, leaving the function untouched, if `id` is not a live
/// instruction whose operand 0 is a register.
pub fn remove_redundant_def(
    func: &mut MachineFunction,
    regs: &RegisterInfo,
    id: InstrId,
) -> Option<KillRepair> {
    let instr = func.instr(id)?;
    let reg = instr.operand(0).and_then(MachineOperand::reg)?;
    let block = instr.parent();
    let position = func.block(block)?.position(id)?;

    let repair = clear_kills_for_def(func, regs, reg, block, position);
    func.erase(id);
    Some(repair)
}
