//! Named counters reported by passes.

use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};

/// A named, thread-safe counter.
///
/// Passes bump statistics while they run; the
/// [`PassManager`](crate::compiler::PassManager) collects them for reporting.
#[derive(Debug)]
pub struct Statistic {
    group: &'static str,
    description: &'static str,
    value: AtomicUsize,
}

impl Statistic {
    /// Creates a zeroed counter. `group` is usually the owning pass's name.
    #[must_use]
    pub const fn new(group: &'static str, description: &'static str) -> Self {
        Self {
            group,
            description,
            value: AtomicUsize::new(0),
        }
    }

    /// The group (pass) this counter belongs to.
    #[must_use]
    pub const fn group(&self) -> &'static str {
        self.group
    }

    /// What is counted.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        self.description
    }

    /// Adds one.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Adds `n`.
    pub fn add(&self, n: usize) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> usize {
        self.value.load(Ordering::Relaxed)
    }

    /// Resets the counter to zero.
    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8} {} - {}", self.get(), self.group, self.description)
    }
}
