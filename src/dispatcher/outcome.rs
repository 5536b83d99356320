use crate::types::EventId;

/// How far an action got. Stages only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionStage {
    Received,
    /// The input is well-formed and the action may touch the store.
    Validated,
    /// The mutation (if any) is persisted.
    Applied,
    Rendered,
    Delivered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Validation(String),
    EventNotFound(EventId),
}

/// The single terminal result of dispatching one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Delivered,
    Rejected(RejectReason),
    /// `stage` is the last stage reached; anything at or past
    /// [`ActionStage::Applied`] stays persisted.
    Failed { stage: ActionStage, error: String },
}

impl ActionOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ActionOutcome::Delivered)
    }
}

/// Tracks the stage of one action through the dispatcher.
#[derive(Debug)]
pub(crate) struct ActionProgress {
    stage: ActionStage,
}

impl ActionProgress {
    pub(crate) fn new() -> Self {
        Self {
            stage: ActionStage::Received,
        }
    }

    /// Moves to `next`; moving backwards is ignored.
    pub(crate) fn advance(&mut self, next: ActionStage) {
        if next > self.stage {
            tracing::trace!(
                target: "rosterbot::dispatcher::progress",
                "{:?} -> {:?}",
                self.stage,
                next
            );
            self.stage = next;
        }
    }

    pub(crate) fn delivered(mut self) -> ActionOutcome {
        self.advance(ActionStage::Delivered);
        ActionOutcome::Delivered
    }

    pub(crate) fn failed(self, error: impl ToString) -> ActionOutcome {
        ActionOutcome::Failed {
            stage: self.stage,
            error: error.to_string(),
        }
    }
}
