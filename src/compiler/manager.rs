//! Pass manager for running machine passes over functions.
//!
//! The `PassManager` owns an ordered list of [`MachinePass`]es, the
//! [`CleanupConfig`] that decides which functions they may touch, and the
//! [`EventLog`] every pass records into.

use rayon::prelude::*;
use tracing::{debug, info_span};

use crate::{
    cleanup::LateInstrsCleanup,
    compiler::{CleanupConfig, EventKind, EventLog, MachinePass, Statistic},
    machine::{FunctionAttributes, MachineFunction, TargetInfo},
    Error, Result,
};

/// Runs passes over machine functions.
pub struct PassManager {
    config: CleanupConfig,
    passes: Vec<Box<dyn MachinePass>>,
    events: EventLog,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new(CleanupConfig::default())
    }
}

impl PassManager {
    /// Creates a manager with no passes.
    #[must_use]
    pub fn new(config: CleanupConfig) -> Self {
        Self {
            config,
            passes: Vec::new(),
            events: EventLog::new(),
        }
    }

    /// Creates a manager running only [`LateInstrsCleanup`].
    #[must_use]
    pub fn late_cleanup(config: CleanupConfig) -> Self {
        let mut manager = Self::new(config);
        manager.add(LateInstrsCleanup::new());
        manager
    }

    /// Appends a pass to the pipeline.
    pub fn add<P: MachinePass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    /// The passes in pipeline order.
    pub fn passes(&self) -> impl Iterator<Item = &dyn MachinePass> + '_ {
        self.passes.iter().map(AsRef::as_ref)
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// Events recorded so far.
    #[must_use]
    pub const fn events(&self) -> &EventLog {
        &self.events
    }

    /// Moves the recorded events out of the manager.
    pub fn take_events(&mut self) -> EventLog {
        self.events.take()
    }

    /// All statistics of all passes, in pipeline order.
    #[must_use]
    pub fn statistics(&self) -> Vec<&Statistic> {
        self.passes.iter().flat_map(|p| p.statistics()).collect()
    }

    /// Formats every statistic with a non-zero value, one per line.
    #[must_use]
    pub fn report(&self) -> String {
        self.statistics()
            .into_iter()
            .filter(|s| s.get() > 0)
            .map(|s| format!("{s}\n"))
            .collect()
    }

    /// Why `func` must not be processed, if it must not.
    fn skip_reason(&self, func: &MachineFunction) -> Option<&'static str> {
        if !self.config.enabled {
            Some("pipeline disabled")
        } else if self.config.is_skipped(func.name()) {
            Some("listed in skip_functions")
        } else if self.config.honor_optnone && func.attributes().contains(FunctionAttributes::OPT_NONE) {
            Some("optnone")
        } else {
            None
        }
    }

    /// Runs every pass on one function.
    ///
    /// Returns `true` if any pass modified the function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingProperties`] if a pass requires properties the
    /// function does not have, or any error a pass reports.
    pub fn run_on_function(&self, func: &mut MachineFunction, target: &TargetInfo) -> Result<bool> {
        let _span = info_span!("function", name = func.name()).entered();

        if let Some(reason) = self.skip_reason(func) {
            debug!(function = func.name(), reason, "skipping function");
            self.events
                .record(EventKind::FunctionSkipped)
                .function(func.name())
                .message(reason);
            return Ok(false);
        }

        let scratch;
        let events = if self.config.record_events {
            &self.events
        } else {
            scratch = EventLog::new();
            &scratch
        };

        let mut changed = false;
        for pass in &self.passes {
            let missing = pass.required_properties().difference(func.properties());
            if !missing.is_empty() {
                return Err(Error::MissingProperties {
                    pass: pass.name(),
                    function: func.name().to_string(),
                    missing,
                });
            }
            if !pass.should_run(func) {
                continue;
            }
            if pass.run_on_function(func, target, events)? {
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Runs every pass on each function.
    ///
    /// Functions are independent, so with [`CleanupConfig::parallel`] they are
    /// processed on the rayon thread pool. Results do not depend on the mode.
    ///
    /// # Errors
    ///
    /// Returns the first error reported for any function.
    pub fn run_on_functions(&self, funcs: &mut [MachineFunction], target: &TargetInfo) -> Result<bool> {
        let results: Vec<bool> = if self.config.parallel {
            funcs
                .par_iter_mut()
                .map(|func| self.run_on_function(func, target))
                .collect::<Result<_>>()?
        } else {
            funcs
                .iter_mut()
                .map(|func| self.run_on_function(func, target))
                .collect::<Result<_>>()?
        };
        Ok(results.into_iter().any(|changed| changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        machine::{FunctionBuilder, FunctionProperties},
        test::toy_target,
    };

    struct CountingPass {
        name: &'static str,
        required: FunctionProperties,
    }

    impl MachinePass for CountingPass {
        fn name(&self) -> &'static str {
            self.name
        }

        fn required_properties(&self) -> FunctionProperties {
            self.required
        }

        fn run_on_function(
            &self,
            func: &mut MachineFunction,
            _target: &TargetInfo,
            events: &EventLog,
        ) -> Result<bool> {
            events
                .record(EventKind::CandidateRecorded)
                .function(func.name())
                .message(self.name);
            Ok(true)
        }
    }

    struct DecliningPass;

    impl MachinePass for DecliningPass {
        fn name(&self) -> &'static str {
            "declines"
        }

        fn required_properties(&self) -> FunctionProperties {
            FunctionProperties::NO_VREGS
        }

        fn should_run(&self, _func: &MachineFunction) -> bool {
            false
        }

        fn run_on_function(
            &self,
            _func: &mut MachineFunction,
            _target: &TargetInfo,
            _events: &EventLog,
        ) -> Result<bool> {
            Ok(true)
        }
    }

    fn single_block(name: &str, attributes: FunctionAttributes) -> MachineFunction {
        let t = toy_target();
        FunctionBuilder::new(name, &t)
            .with_attributes(attributes)
            .block(0, |b| b.instr("RET", |i| i))
            .build()
            .unwrap()
    }

    #[test]
    fn test_pass_names() {
        let mut manager = PassManager::default();
        manager.add(CountingPass { name: "pass1", required: FunctionProperties::empty() });
        manager.add(LateInstrsCleanup::new());

        let names: Vec<_> = manager.passes().map(|p| p.name()).collect();
        assert_eq!(names, vec!["pass1", "machine-latecleanup"]);
    }

    #[test]
    fn test_skip_reasons() {
        let t = toy_target();
        let config = CleanupConfig::new().with_skip_function("skipped");
        let mut manager = PassManager::new(config);
        manager.add(CountingPass { name: "p", required: FunctionProperties::empty() });

        let mut skipped = single_block("skipped", FunctionAttributes::empty());
        let mut optnone = single_block("slow", FunctionAttributes::OPT_NONE);
        let mut normal = single_block("normal", FunctionAttributes::empty());

        assert!(!manager.run_on_function(&mut skipped, &t).unwrap());
        assert!(!manager.run_on_function(&mut optnone, &t).unwrap());
        assert!(manager.run_on_function(&mut normal, &t).unwrap());

        assert_eq!(manager.events().count(EventKind::FunctionSkipped), 2);
        assert_eq!(manager.events().count(EventKind::CandidateRecorded), 1);
    }

    #[test]
    fn test_disabled_runs_nothing() {
        let t = toy_target();
        let mut manager = PassManager::new(CleanupConfig::disabled());
        manager.add(CountingPass { name: "p", required: FunctionProperties::empty() });

        let mut func = single_block("f", FunctionAttributes::empty());
        assert!(!manager.run_on_function(&mut func, &t).unwrap());
        assert_eq!(manager.events().stats().functions_skipped, 1);
    }

    #[test]
    fn test_missing_properties() {
        let t = toy_target();
        let mut manager = PassManager::default();
        manager.add(CountingPass { name: "needs-vregs-gone", required: FunctionProperties::NO_VREGS });

        let mut func = FunctionBuilder::new("virt", &t)
            .block(0, |b| b.instr("LI", |i| i.def("%0").imm(1)))
            .build()
            .unwrap();

        match manager.run_on_function(&mut func, &t) {
            Err(Error::MissingProperties { pass, function, missing }) => {
                assert_eq!(pass, "needs-vregs-gone");
                assert_eq!(function, "virt");
                assert_eq!(missing, FunctionProperties::NO_VREGS);
            }
            other => panic!("expected MissingProperties, got {other:?}"),
        }
    }

    #[test]
    fn test_properties_checked_before_should_run() {
        let t = toy_target();
        let mut manager = PassManager::default();
        manager.add(DecliningPass);

        let mut virt = FunctionBuilder::new("virt", &t)
            .block(0, |b| b.instr("LI", |i| i.def("%0").imm(1)))
            .build()
            .unwrap();
        assert!(matches!(
            manager.run_on_function(&mut virt, &t),
            Err(Error::MissingProperties { pass: "declines", .. })
        ));

        let mut phys = single_block("phys", FunctionAttributes::empty());
        assert!(!manager.run_on_function(&mut phys, &t).unwrap());
    }

    #[test]
    fn test_record_events_off() {
        let t = toy_target();
        let mut manager = PassManager::new(CleanupConfig::new().with_record_events(false));
        manager.add(CountingPass { name: "p", required: FunctionProperties::empty() });

        let mut func = single_block("f", FunctionAttributes::empty());
        assert!(manager.run_on_function(&mut func, &t).unwrap());
        assert!(manager.events().is_empty());
    }
}
