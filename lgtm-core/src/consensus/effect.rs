//! Effects (side effects as data).
//!
//! Transitions never talk to GitHub. They return the effects below, and the
//! publisher in the server crate executes them in order.

/// All effects that can be produced by consensus transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Reply to the comment that triggered the transition.
    Reply { message: String },

    /// Write the record to its tracking comment, creating the comment if the
    /// record has no comment ID yet. Failure aborts the remaining effects.
    PublishRecord,

    /// Add the ready label. Best effort.
    AddLabel,

    /// Remove the ready label. Best effort.
    RemoveLabel,

    /// Log a message (for debugging/tracing).
    Log { level: LogLevel, message: String },
}

impl Effect {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Effect::Log {
            level,
            message: message.into(),
        }
    }

    /// Label effects may fail without failing the event: the label is derived
    /// from the tracking comment and is corrected by the next event.
    pub fn is_best_effort(&self) -> bool {
        matches!(
            self,
            Effect::AddLabel | Effect::RemoveLabel | Effect::Log { .. }
        )
    }
}

/// Log level for logging effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
}

/// The label effect needed to make the label agree with `ready`, if any.
pub fn reconcile_label(ready: bool, label_present: bool) -> Option<Effect> {
    match (ready, label_present) {
        (true, false) => Some(Effect::AddLabel),
        (false, true) => Some(Effect::RemoveLabel),
        _ => None,
    }
}
