//! Change tracking for machine passes.
//!
//! Every decision a pass takes that affects the output (or explains why the
//! output was left alone) is recorded as an [`Event`] in an [`EventLog`].
//! The log is append-only and lock-free, so passes running on different
//! functions in parallel can share one log.
//!
//! ```rust
//! use latecleanup::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::InstructionRemoved)
//!     .function("main")
//!     .message("$r0 = LI 5");
//!
//! assert_eq!(log.count(EventKind::InstructionRemoved), 1);
//! assert_eq!(log.stats().instructions_removed, 1);
//! ```

use std::fmt;

use strum::{Display, EnumIter};

use crate::machine::BlockId;

/// The kind of change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum EventKind {
    /// A redundant instruction was erased.
    #[strum(serialize = "instruction-removed")]
    InstructionRemoved,
    /// A definition was inherited from all predecessors of a block.
    #[strum(serialize = "definition-reused")]
    DefinitionReused,
    /// A definition became available for reuse.
    #[strum(serialize = "candidate-recorded")]
    CandidateRecorded,
    /// Every known definition was forgotten after the frame register changed.
    #[strum(serialize = "definitions-invalidated")]
    DefinitionsInvalidated,
    /// A kill flag was cleared to extend a register's live range.
    #[strum(serialize = "kill-flag-cleared")]
    KillFlagCleared,
    /// A register was added to a block's live-in list.
    #[strum(serialize = "live-in-added")]
    LiveInAdded,
    /// A function was not processed.
    #[strum(serialize = "function-skipped")]
    FunctionSkipped,
}

/// A single recorded change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// The function it happened in, if known.
    pub function: Option<String>,
    /// The block it happened in, if known.
    pub block: Option<BlockId>,
    /// Free-form detail, usually the instruction involved.
    pub message: String,
}

impl Event {
    /// Creates an event with no location and no message.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            function: None,
            block: None,
            message: String::new(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(function) = &self.function {
            write!(f, " {function}")?;
        }
        if let Some(block) = self.block {
            write!(f, " {block}")?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Append-only, thread-safe collection of events.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts recording an event of `kind`.
    ///
    /// The event is appended when the returned builder is dropped, so the
    /// usual form is a single chained statement.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            event: Some(Event::new(kind)),
        }
    }

    /// Appends a complete event.
    pub fn push(&self, event: Event) {
        self.events.push(event);
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over the events in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().map(|(_, event)| event)
    }

    /// Number of events of `kind`.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    /// Appends every event of `other`.
    pub fn merge(&self, other: &EventLog) {
        for event in other.iter() {
            self.events.push(event.clone());
        }
    }

    /// Moves the events out, leaving the log empty.
    pub fn take(&mut self) -> EventLog {
        std::mem::take(self)
    }

    /// Summarizes the log.
    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        let mut stats = DerivedStats::default();
        for event in self.iter() {
            match event.kind {
                EventKind::InstructionRemoved => stats.instructions_removed += 1,
                EventKind::DefinitionReused => stats.definitions_reused += 1,
                EventKind::CandidateRecorded => stats.candidates_recorded += 1,
                EventKind::DefinitionsInvalidated => stats.invalidations += 1,
                EventKind::KillFlagCleared => stats.kill_flags_cleared += 1,
                EventKind::LiveInAdded => stats.live_ins_added += 1,
                EventKind::FunctionSkipped => stats.functions_skipped += 1,
            }
        }
        stats
    }
}

/// Builder returned by [`EventLog::record`]; commits the event on drop.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    event: Option<Event>,
}

impl EventBuilder<'_> {
    /// Sets the function name.
    #[must_use]
    pub fn function(mut self, name: &str) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.function = Some(name.to_string());
        }
        self
    }

    /// Sets the block.
    #[must_use]
    pub fn block(mut self, block: BlockId) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.block = Some(block);
        }
        self
    }

    /// Sets the message. Ends the chain.
    pub fn message(mut self, message: impl Into<String>) {
        if let Some(event) = self.event.as_mut() {
            event.message = message.into();
        }
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.log.push(event);
        }
    }
}

/// Totals per event kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedStats {
    /// Redundant instructions erased.
    pub instructions_removed: usize,
    /// Definitions inherited from predecessors.
    pub definitions_reused: usize,
    /// Candidate definitions recorded.
    pub candidates_recorded: usize,
    /// Frame register writes that flushed a table.
    pub invalidations: usize,
    /// Kill flags cleared.
    pub kill_flags_cleared: usize,
    /// Live-in registers added.
    pub live_ins_added: usize,
    /// Functions not processed.
    pub functions_skipped: usize,
}

impl DerivedStats {
    /// Returns `true` if anything in the output changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.instructions_removed > 0 || self.kill_flags_cleared > 0 || self.live_ins_added > 0
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} removed, {} reused, {} kills cleared, {} live-ins added, {} skipped",
            self.instructions_removed,
            self.definitions_reused,
            self.kill_flags_cleared,
            self.live_ins_added,
            self.functions_skipped
        )
    }
}
