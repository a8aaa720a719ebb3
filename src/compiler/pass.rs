//! Pass trait for machine-level transformations.
//!
//! This module defines the `MachinePass` trait that every late code
//! generation pass implements. Passes are driven by the
//! [`PassManager`](crate::compiler::PassManager), which decides whether a
//! function is processed at all and checks the properties a pass depends on
//! before handing the function over.

use crate::{
    compiler::{EventLog, Statistic},
    machine::{FunctionProperties, MachineFunction, TargetInfo},
    Result,
};

/// A transformation over a single machine function.
///
/// All passes must be thread-safe (Send + Sync) so that the pass manager can
/// process independent functions in parallel. A pass receives exclusive
/// access to the function it transforms and shared access to the target
/// description and the event log.
///
/// # Preconditions
///
/// Passes do not check their own preconditions. Instead, the pass manager:
///
/// 1. Skips functions excluded by configuration or marked `optnone`
/// 2. Verifies that [`required_properties`](MachinePass::required_properties)
///    are all established on the function, failing the run if not
/// 3. Asks [`should_run`](MachinePass::should_run)
///
/// and only then calls [`run_on_function`](MachinePass::run_on_function).
pub trait MachinePass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Function properties that must hold before this pass may run.
    fn required_properties(&self) -> FunctionProperties {
        FunctionProperties::empty()
    }

    /// Should this pass run on a specific function?
    ///
    /// Called after the configuration-level skip checks. Override to skip
    /// functions the pass cannot improve.
    fn should_run(&self, _func: &MachineFunction) -> bool {
        true
    }

    /// Run the pass on a single function.
    ///
    /// Returns `true` if the function was modified, `false` otherwise.
    /// Events should be recorded directly to `events`.
    ///
    /// # Arguments
    ///
    /// * `func` - The function to transform.
    /// * `target` - The target the function is compiled for.
    /// * `events` - Shared event log (thread-safe, append only).
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails to process the function.
    fn run_on_function(
        &self,
        func: &mut MachineFunction,
        target: &TargetInfo,
        events: &EventLog,
    ) -> Result<bool>;

    /// Counters maintained by this pass, for reporting.
    fn statistics(&self) -> Vec<&Statistic> {
        Vec::new()
    }
}
