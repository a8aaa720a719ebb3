// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # latecleanup
//!
//! A late, post register allocation cleanup pass over machine code.
//!
//! After register allocation and frame index elimination a function often
//! materializes the same immediate or address into the same register more
//! than once. `latecleanup` finds such instructions, proves them redundant with
//! a forward analysis over the control-flow graph, removes them, and repairs
//! kill flags and block live-in lists so the function stays consistent.
//!
//! ## Features
//!
//! - **Machine representation** - Blocks, instructions and operands over physical registers, with sub/super-register overlap
//! - **Cross-block reuse** - Definitions every predecessor agrees on carry into a block
//! - **Liveness repair** - Kill flags and live-ins are fixed up after each removal
//! - **Pass infrastructure** - `MachinePass` trait, pass manager, event log and statistics
//! - **Parallel processing** - Independent functions can be processed on the rayon thread pool
//!
//! ## Quick Start
//!
//! ```rust
//! use latecleanup::prelude::*;
//!
//! let target = TargetBuilder::new("toy")
//!     .register("r0")
//!     .register("fp")
//!     .frame_pointer("fp")
//!     .instruction("LA", InstrFlags::empty())
//!     .instruction("ST", InstrFlags::MAY_STORE)
//!     .build()?;
//!
//! let mut func = FunctionBuilder::new("store_twice", &target)
//!     .with_frame_pointer(true)
//!     .block(0, |b| {
//!         b.instr("LA", |i| i.def("r0").read("fp").imm(8))
//!             .instr("ST", |i| i.read("r0").imm(0))
//!             .instr("LA", |i| i.def("r0").read("fp").imm(8))
//!             .instr("ST", |i| i.kill("r0").imm(4))
//!     })
//!     .build()?;
//!
//! let manager = PassManager::late_cleanup(CleanupConfig::default());
//! assert!(manager.run_on_function(&mut func, &target)?);
//! assert_eq!(func.instruction_count(), 3);
//! assert_eq!(manager.events().stats().instructions_removed, 1);
//! # Ok::<(), latecleanup::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`machine`] - Machine functions, blocks, instructions and the target description
//! - [`cleanup`] - The late instructions cleanup pass and its building blocks
//! - [`compiler`] - Pass trait, pass manager, configuration, events and statistics
//! - [`utils`] - Supporting data structures
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! Every decision of the pass is logged through [`tracing`] under the target
//! `machine-latecleanup`. Install any `tracing` subscriber to see them.

pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use latecleanup::prelude::*;
///
/// let pass = LateInstrsCleanup::new();
/// assert_eq!(pass.name(), "machine-latecleanup");
/// ```
pub mod prelude;

pub mod cleanup;
pub mod compiler;
pub mod machine;

/// Supporting data structures.
pub mod utils;

/// `latecleanup` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;
