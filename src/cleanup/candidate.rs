//! Recognition of cheap materialization instructions.
//!
//! A candidate is a simple instruction that does not touch memory, defines
//! exactly one register (operand 0) and reads at most the frame register.
//! Typically this is an immediate load or a load-address instruction: the
//! only kinds of instruction an identical later copy of which can be dropped
//! without any further analysis.

use crate::machine::{MachineInstr, MachineOperand, Reg};

/// Returns the register `instr` materializes, if it is a candidate.
///
/// `frame_reg` is the function's frame register. It is the only register a
/// candidate may read; uses of [`Reg::NONE`] are ignored.
#[must_use]
pub fn classify(instr: &MachineInstr, frame_reg: Reg) -> Option<Reg> {
    let mut saw_store = true;
    if !instr.is_safe_to_move(&mut saw_store) || instr.is_implicit_def() || instr.is_inline_asm() {
        return None;
    }

    let mut defined = None;
    for (i, op) in instr.operands().iter().enumerate() {
        match op {
            MachineOperand::Register { reg, .. } if op.is_def() => {
                if i == 0 && !op.is_implicit() && !op.is_dead() {
                    defined = Some(*reg);
                } else {
                    return None;
                }
            }
            MachineOperand::Register { reg, .. } => {
                if reg.is_valid() && *reg != frame_reg {
                    return None;
                }
            }
            other if other.is_materializable() => {}
            _ => return None,
        }
    }

    defined.filter(|reg| reg.is_valid())
}
