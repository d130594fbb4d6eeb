use crate::shared::error::ErrorKind;

/// Lifecycle of one detection run.
///
/// `Idle → Loading → Streaming → Draining → Reporting → Done`. A failure
/// while loading or streaming ends in `Aborted`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Loading,
    Streaming,
    Draining,
    Reporting,
    Done,
    Aborted(ErrorKind),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Aborted(_))
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Loading)
                | (Loading, Streaming)
                | (Streaming, Draining)
                | (Draining, Reporting)
                | (Reporting, Done)
                | (Loading, Aborted(_))
                | (Streaming, Aborted(_))
                | (Draining, Aborted(_))
        )
    }
}
