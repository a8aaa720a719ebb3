//! Configuration for the late cleanup pipeline.

/// Configuration for the late cleanup pipeline.
///
/// Controls which functions are processed, whether events are kept, and
/// whether independent functions are processed in parallel.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Master switch. When `false` no function is modified.
    pub enabled: bool,

    /// Names of functions that are never processed.
    pub skip_functions: Vec<String>,

    /// Leave functions carrying the `optnone` attribute untouched (default: `true`).
    pub honor_optnone: bool,

    /// Keep the events recorded by passes in the manager's log (default: `true`).
    ///
    /// When disabled, passes still run but their events are discarded.
    pub record_events: bool,

    /// Process functions in parallel in multi-function runs (default: `false`).
    pub parallel: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            skip_functions: Vec::new(),
            honor_optnone: true,
            record_events: true,
            parallel: false,
        }
    }
}

impl CleanupConfig {
    /// Creates a new configuration with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that processes nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Adds a function name to the skip list.
    #[must_use]
    pub fn with_skip_function(mut self, name: impl Into<String>) -> Self {
        self.skip_functions.push(name.into());
        self
    }

    /// Sets whether `optnone` functions are left untouched.
    #[must_use]
    pub fn with_honor_optnone(mut self, honor: bool) -> Self {
        self.honor_optnone = honor;
        self
    }

    /// Sets whether events are kept.
    #[must_use]
    pub fn with_record_events(mut self, record: bool) -> Self {
        self.record_events = record;
        self
    }

    /// Sets whether multi-function runs use the rayon thread pool.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Returns true if `name` is on the skip list.
    #[must_use]
    pub fn is_skipped(&self, name: &str) -> bool {
        self.skip_functions.iter().any(|s| s == name)
    }
}
