use std::collections::HashMap;

use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::tree::ProjectPath;

/// Debounce deadlines for the two write paths, plus the mirror watermarks.
///
/// Nothing here sleeps: the session loop asks for `next_deadline()`, waits
/// for it, and then takes whatever is due. Rescheduling a deadline simply
/// overwrites it, which is what cancels the previous fire.
#[derive(Debug)]
pub struct SyncScheduler {
    mirror_delay: Duration,
    autosave_delay: Duration,
    mirror_due: HashMap<ProjectPath, Instant>,
    autosave_due: Option<Instant>,
    watermarks: HashMap<ProjectPath, String>,
}

impl SyncScheduler {
    pub fn new(mirror_delay: Duration, autosave_delay: Duration) -> Self {
        Self {
            mirror_delay,
            autosave_delay,
            mirror_due: HashMap::new(),
            autosave_due: None,
            watermarks: HashMap::new(),
        }
    }

    /// Re-arm the mirror timer of `id` and the shared auto-save timer
    pub fn note_edit(&mut self, id: &ProjectPath, now: Instant) {
        self.mirror_due.insert(id.clone(), now + self.mirror_delay);
        self.autosave_due = Some(now + self.autosave_delay);
    }

    /// Re-arm only the mirror timer, for edits to a background buffer
    pub fn schedule_mirror(&mut self, id: &ProjectPath, now: Instant) {
        self.mirror_due.insert(id.clone(), now + self.mirror_delay);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.mirror_due
            .values()
            .copied()
            .chain(self.autosave_due)
            .min()
    }

    /// Remove and return the buffers whose mirror timer has fired
    pub fn take_due_mirrors(&mut self, now: Instant) -> Vec<ProjectPath> {
        let mut due: Vec<ProjectPath> = self
            .mirror_due
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        due.sort();
        for id in &due {
            self.mirror_due.remove(id);
        }
        due
    }

    /// Whether the auto-save timer has fired; clears it if so
    pub fn take_due_autosave(&mut self, now: Instant) -> bool {
        match self.autosave_due {
            Some(deadline) if deadline <= now => {
                self.autosave_due = None;
                true
            }
            _ => false,
        }
    }

    pub fn mirror_pending(&self, id: &ProjectPath) -> bool {
        self.mirror_due.contains_key(id)
    }

    pub fn autosave_pending(&self) -> bool {
        self.autosave_due.is_some()
    }

    /// Whether `content` differs from what was last mirrored for `id`
    pub fn needs_mirror(&self, id: &ProjectPath, content: &str) -> bool {
        self.watermarks.get(id).map(String::as_str) != Some(content)
    }

    /// Only called after the sandbox accepted the write
    pub fn record_mirrored(&mut self, id: &ProjectPath, content: &str) {
        self.watermarks.insert(id.clone(), content.to_string());
    }

    pub fn watermark(&self, id: &ProjectPath) -> Option<&str> {
        self.watermarks.get(id).map(String::as_str)
    }

    /// Drop the watermark of a closed buffer. A pending mirror fire for it is
    /// left in place and turns into a no-op.
    pub fn forget(&mut self, id: &ProjectPath) {
        self.watermarks.remove(id);
    }

    pub fn forget_all(&mut self) {
        self.watermarks.clear();
    }

    /// Carry the watermark and any pending mirror of `from` over to `to`
    pub fn rebind(&mut self, from: &ProjectPath, to: &ProjectPath) {
        if let Some(mark) = self.watermarks.remove(from) {
            self.watermarks.insert(to.clone(), mark);
        }
        if let Some(deadline) = self.mirror_due.remove(from) {
            self.mirror_due.insert(to.clone(), deadline);
        }
    }

    pub fn cancel_all(&mut self) {
        debug!(
            "cancelling {} mirror timer(s), autosave pending: {}",
            self.mirror_due.len(),
            self.autosave_due.is_some()
        );
        self.mirror_due.clear();
        self.autosave_due = None;
    }
}
