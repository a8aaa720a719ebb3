//! Machine-level program representation.
//!
//! This is the representation late code generation passes work on: physical
//! registers, target opcodes, and basic blocks connected into a control-flow
//! graph.
//!
//! # Architecture
//!
//! ```text
//! TargetInfo ─────────── RegisterInfo (names, register units, overlap)
//!    │                   InstrDesc    (opcode, mnemonic, InstrFlags)
//!    │
//! MachineFunction
//!    ├─ MachineBasicBlock[]   ordered InstrId handles, preds/succs, live-ins
//!    └─ instruction arena     InstrId -> MachineInstr (operands, parent)
//! ```
//!
//! Functions are usually assembled with [`FunctionBuilder`], which resolves
//! register and opcode names against a [`TargetInfo`].

mod block;
mod builder;
mod function;
mod instruction;
mod operand;
mod register;
mod target;
pub mod traversal;

pub use block::{BlockId, MachineBasicBlock};
pub use builder::{BlockBuilder, FunctionBuilder, InstrBuilder};
pub use function::{
    FrameInfo, FunctionAttributes, FunctionDisplay, FunctionProperties, InstrId, MachineFunction,
};
pub use instruction::{InstrDesc, InstrDisplay, InstrFlags, MachineInstr};
pub use operand::{MachineOperand, OperandDisplay, OperandKind, RegFlags};
pub use register::{Reg, RegisterInfo};
pub use target::{TargetBuilder, TargetInfo};
