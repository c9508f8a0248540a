use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::tree::ProjectPath;

/// What to do once the user answers a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingAction {
    /// Close one dirty buffer: save it on confirm, discard on cancel
    CloseBuffer { id: ProjectPath },
    /// Close every buffer: save the dirty ones on confirm, discard on cancel
    CloseAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationRequest {
    pub title: String,
    pub description: String,
    pub action: PendingAction,
}

/// How the visible prompt changed since it was last announced
#[derive(Debug, PartialEq, Eq)]
pub enum PromptChange<'a> {
    Show(&'a ConfirmationRequest),
    Cleared,
}

/// Destructive actions waiting on the user.
///
/// Requests queue up in arrival order; only the front one is shown. A request
/// for an action that is already waiting is dropped.
#[derive(Debug, Default)]
pub struct ConfirmationGate {
    pending: VecDeque<ConfirmationRequest>,
    announced: Option<PendingAction>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request; returns true when it is the one now shown
    pub fn request(&mut self, request: ConfirmationRequest) -> bool {
        if self.pending.iter().any(|p| p.action == request.action) {
            return false;
        }
        self.pending.push_back(request);
        self.pending.len() == 1
    }

    pub fn is_open(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The prompt currently shown
    pub fn current(&self) -> Option<&ConfirmationRequest> {
        self.pending.front()
    }

    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    /// Answer the shown prompt, handing back its action
    pub fn resolve(&mut self) -> Option<PendingAction> {
        self.pending.pop_front().map(|request| request.action)
    }

    /// Follow a buffer whose id changed while its close was waiting
    pub fn rebind(&mut self, from: &ProjectPath, to: &ProjectPath) {
        let actions = self
            .pending
            .iter_mut()
            .map(|request| &mut request.action)
            .chain(self.announced.as_mut());
        for action in actions {
            if let PendingAction::CloseBuffer { id } = action {
                if id == from {
                    *id = to.clone();
                }
            }
        }
    }

    /// Drop the queued close of a buffer that no longer exists
    pub fn forget(&mut self, id: &ProjectPath) {
        self.pending.retain(|request| {
            !matches!(&request.action, PendingAction::CloseBuffer { id: queued } if queued == id)
        });
    }

    /// Drop every prompt once no buffer is left to act on
    pub fn forget_all(&mut self) {
        self.pending.clear();
    }

    /// Report a change of the visible prompt since the last call
    pub fn refresh(&mut self) -> Option<PromptChange<'_>> {
        let front = self.pending.front().map(|request| request.action.clone());
        if front == self.announced {
            return None;
        }
        self.announced = front;
        Some(match self.pending.front() {
            Some(request) => PromptChange::Show(request),
            None => PromptChange::Cleared,
        })
    }

    /// Drop everything, including what was announced
    pub fn clear(&mut self) {
        self.pending.clear();
        self.announced = None;
    }
}
