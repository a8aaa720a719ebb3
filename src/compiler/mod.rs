//! Pass infrastructure for machine-level transformations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Pass Pipeline                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PassManager                 Per-function execution              │
//! │    ├─ CleanupConfig           (enabled, skip list, optnone)      │
//! │    ├─ required properties     (e.g. no virtual registers)        │
//! │    └─ parallel mode           (rayon, one function per worker)   │
//! │                                                                  │
//! │  MachinePass trait           Interface for all passes            │
//! │    ├─ run_on_function()       Per-function transformation        │
//! │    ├─ required_properties()   Preconditions checked by manager   │
//! │    └─ statistics()            Counters for reporting             │
//! │                                                                  │
//! │  EventLog                    Change tracking and diagnostics     │
//! │  Statistic                   Named atomic counters               │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod events;
mod manager;
mod pass;
mod statistic;

pub use config::CleanupConfig;
pub use events::{DerivedStats, Event, EventBuilder, EventKind, EventLog};
pub use manager::PassManager;
pub use pass::MachinePass;
pub use statistic::Statistic;
