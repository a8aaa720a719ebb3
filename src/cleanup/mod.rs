//! Late removal of redundant register materializations.
//!
//! After register allocation and frame index elimination, a function often
//! contains several identical instructions loading the same immediate or
//! address into the same register: rematerialized constants, and frame
//! addressing anchors created once per stack access. This module removes
//! every such instruction that is provably redundant.
//!
//! - [`candidate`] - Which instructions are cheap materializations
//! - [`table`] - Per-block register to definition tables
//! - [`kills`] - Deletion with kill-flag and live-in repair
//! - [`LateInstrsCleanup`] - The pass tying them together
//!
//! The pass only removes an instruction when, on every path reaching it, the
//! same register already holds the result of an identical instruction and
//! nothing in between changed that register or the frame register.

pub mod candidate;
pub mod kills;
mod pass;
pub mod table;

pub use candidate::classify;
pub use kills::{clear_kills_for_def, remove_redundant_def, KillRepair};
pub use pass::{seed_from_predecessors, LateInstrsCleanup, PASS_NAME};
pub use table::{DefinitionTable, RegDefs};
