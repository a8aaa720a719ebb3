//! # latecleanup Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the latecleanup library. Import this module to get quick access to the essential
//! types for building machine functions and running the cleanup.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all latecleanup operations
pub use crate::Error;

/// The result type used throughout latecleanup
pub use crate::Result;

// ================================================================================================
// Machine Representation
// ================================================================================================

pub use crate::machine::{
    BlockId, FunctionAttributes, FunctionBuilder, FunctionProperties, InstrFlags, InstrId,
    MachineBasicBlock, MachineFunction, MachineInstr, MachineOperand, Reg, RegFlags,
    RegisterInfo, TargetBuilder, TargetInfo,
};

// ================================================================================================
// Passes and Pipeline
// ================================================================================================

pub use crate::cleanup::LateInstrsCleanup;

pub use crate::compiler::{
    CleanupConfig, DerivedStats, Event, EventKind, EventLog, MachinePass, PassManager, Statistic,
};
