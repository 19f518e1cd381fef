//! Pipeline state machine.
//!
//! [`PipelineState`] names each phase of one request.  [`StateTrace`]
//! records the phases a run went through and refuses transitions that are
//! not in the graph below.

use thiserror::Error;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of one speech request.
///
/// The state machine transitions are:
///
/// ```text
/// Init ──translation required──▶ Translating ──▶ Synthesizing
/// Init ─────────────────────────────────────────▶ Synthesizing
/// Synthesizing ──primary ok──────▶ Assembling
/// Synthesizing ──primary failed──▶ Fallback ──▶ Assembling
/// Assembling ──▶ Encoding ──▶ Done
/// any non-terminal state ──unrecoverable error──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineState {
    /// Request accepted, nothing started yet.
    #[default]
    Init,

    /// Waiting on the translation provider.
    Translating,

    /// Primary streaming synthesis running.
    Synthesizing,

    /// Primary synthesis failed; a lower tier is running.
    Fallback,

    /// All samples collected; building the final buffer.
    Assembling,

    /// Writing the container.
    Encoding,

    /// Audio produced.
    Done,

    /// The run ended with an error.
    Failed,
}

impl PipelineState {
    /// `Done` and `Failed` end a run.
    ///
    /// ```
    /// use text_to_voice::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Init.is_terminal());
    /// assert!(!PipelineState::Fallback.is_terminal());
    /// assert!(PipelineState::Done.is_terminal());
    /// assert!(PipelineState::Failed.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    /// A short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Init => "init",
            PipelineState::Translating => "translating",
            PipelineState::Synthesizing => "synthesizing",
            PipelineState::Fallback => "fallback",
            PipelineState::Assembling => "assembling",
            PipelineState::Encoding => "encoding",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }

    /// Whether `next` may follow `self`.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;

        if next == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Init, Translating)
                | (Init, Synthesizing)
                | (Translating, Synthesizing)
                | (Synthesizing, Assembling)
                | (Synthesizing, Fallback)
                | (Fallback, Assembling)
                | (Assembling, Encoding)
                | (Encoding, Done)
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// StateTrace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid pipeline transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Ordered record of the states one run visited.  Always starts at `Init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrace {
    states: Vec<PipelineState>,
}

impl StateTrace {
    pub fn new() -> Self {
        Self {
            states: vec![PipelineState::Init],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.states
            .last()
            .copied()
            .unwrap_or(PipelineState::Init)
    }

    /// Move to `next`, or leave the trace untouched if the edge is not in
    /// the graph.
    pub fn advance(&mut self, next: PipelineState) -> Result<(), InvalidTransition> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(InvalidTransition { from, to: next });
        }
        log::debug!("pipeline: {from} -> {next}");
        self.states.push(next);
        Ok(())
    }

    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }

    pub fn visited(&self, state: PipelineState) -> bool {
        self.states.contains(&state)
    }

    pub fn is_finished(&self) -> bool {
        self.current().is_terminal()
    }
}

impl Default for StateTrace {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
