use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use codepad_platform::sandbox::SandboxFs;
use codepad_platform::store::{ProjectStore, TemplateLoader};

use crate::buffers::BufferRegistry;
use crate::config::WorkspaceConfig;
use crate::confirm::{
    ConfirmationGate, ConfirmationRequest, PendingAction, PromptChange, Resolution,
};
use crate::error::{Result, WorkspaceError};
use crate::events::{EventSink, WorkspaceEvent};
use crate::language::language_for_extension;
use crate::scheduler::SyncScheduler;
use crate::tree::{ProjectPath, Tree};

/// External services a workspace talks to
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn ProjectStore>,
    pub templates: Arc<dyn TemplateLoader>,
    pub sandbox: Arc<dyn SandboxFs>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    AwaitingConfirmation,
}

/// Per-buffer outcome of `save_all`
#[derive(Debug, Default)]
pub struct SaveReport {
    pub saved: Vec<ProjectPath>,
    pub failed: Vec<(ProjectPath, String)>,
}

/// What the editor widget renders for the active buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorView {
    pub id: String,
    pub content: String,
    pub language: &'static str,
}

/// One open project: the tree, its open buffers, and the sync state that
/// keeps the store and the sandbox in step with them.
///
/// All methods take `&mut self`, so operations never interleave inside the
/// workspace; the session loop feeds them one at a time.
pub struct Workspace {
    pub(crate) project_id: String,
    pub(crate) tree: Tree,
    pub(crate) buffers: BufferRegistry,
    pub(crate) scheduler: SyncScheduler,
    pub(crate) gate: ConfirmationGate,
    pub(crate) backends: Backends,
    pub(crate) events: EventSink,
}

impl Workspace {
    pub fn new(
        project_id: impl Into<String>,
        backends: Backends,
        config: &WorkspaceConfig,
        events: EventSink,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            tree: Tree::default(),
            buffers: BufferRegistry::new(),
            scheduler: SyncScheduler::new(config.mirror_delay(), config.autosave_delay()),
            gate: ConfirmationGate::new(),
            backends,
            events,
        }
    }

    /// Start from an already known tree instead of loading one
    pub fn with_tree(mut self, tree: Tree) -> Self {
        self.tree = tree;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Current tree revision; cloning it yields a stable snapshot
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn buffers(&self) -> &BufferRegistry {
        &self.buffers
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    /// Load the project tree from the store, falling back to its template
    pub async fn load(&mut self) -> Result<()> {
        let record = self
            .backends
            .store
            .load_project(&self.project_id)
            .await
            .map_err(|reason| WorkspaceError::Persistence {
                project: self.project_id.clone(),
                reason,
            })?;

        let tree = match record.tree {
            Some(saved) => Tree::from_template(&saved),
            None => {
                info!(
                    "project {} has no saved tree, seeding from template {:?}",
                    self.project_id, record.template
                );
                let items = self
                    .backends
                    .templates
                    .load_template(&record.template)
                    .await
                    .map_err(|reason| WorkspaceError::Template {
                        template: record.template.clone(),
                        reason,
                    })?;
                Tree::from_template(&items.into_root())
            }
        };

        self.buffers.clear();
        self.scheduler.cancel_all();
        self.scheduler.forget_all();
        self.gate.clear();
        self.tree = tree;

        info!(
            "loaded project {} ({} files)",
            self.project_id,
            self.tree.files().len()
        );
        self.events.emit(WorkspaceEvent::TreeChanged);
        self.publish_buffers();
        Ok(())
    }

    /// Rebuild the sandbox filesystem from the tree. Returns the number of
    /// entries that could not be written.
    pub async fn mount_sandbox(&self) -> usize {
        let mut failures = 0;
        for folder in self.tree.folders() {
            if !self.sandbox_make_dir(&folder).await {
                failures += 1;
            }
        }
        for (path, file) in self.tree.files() {
            if !self.sandbox_write(&path, &file.content).await {
                failures += 1;
            }
        }
        info!(
            "mounted project {} into sandbox ({} failures)",
            self.project_id, failures
        );
        failures
    }

    /// Open the file at `path`, reusing its buffer if it is already open
    pub fn open(&mut self, path: &ProjectPath) -> Result<()> {
        let file = self.tree.require_file(path)?;
        if self.buffers.open(path, file) {
            debug!("opened buffer {}", path);
        }
        if let Some(view) = self.active_view() {
            self.events.emit(WorkspaceEvent::Active(view));
        }
        self.publish_buffers();
        Ok(())
    }

    pub fn active_view(&self) -> Option<EditorView> {
        let buffer = self.buffers.active()?;
        Some(EditorView {
            id: buffer.id().to_string(),
            content: buffer.content().to_string(),
            language: language_for_extension(&buffer.key().extension),
        })
    }

    /// Edit the active buffer
    pub fn edit(&mut self, content: &str) -> Result<()> {
        let id = self
            .buffers
            .active_id()
            .cloned()
            .ok_or_else(|| WorkspaceError::BufferNotOpen {
                id: "<none>".to_string(),
            })?;
        self.edit_buffer(&id, content)
    }

    /// Replace a buffer's content and re-arm its sync timers. The auto-save
    /// timer only follows edits to the active buffer.
    pub fn edit_buffer(&mut self, id: &ProjectPath, content: &str) -> Result<()> {
        let was_dirty = self
            .buffers
            .get(id)
            .map(|b| b.has_unsaved_changes())
            .unwrap_or(false);
        let dirty = self.buffers.edit(id, content)?;

        let now = Instant::now();
        if self.buffers.active_id() == Some(id) {
            self.scheduler.note_edit(id, now);
        } else {
            self.scheduler.schedule_mirror(id, now);
        }

        if was_dirty != dirty {
            self.publish_buffers();
        }
        Ok(())
    }

    /// Close a buffer, asking first if it has unsaved changes
    pub fn close(&mut self, id: &ProjectPath) -> Result<CloseOutcome> {
        let buffer = self
            .buffers
            .get(id)
            .ok_or_else(|| WorkspaceError::BufferNotOpen { id: id.to_string() })?;

        if buffer.has_unsaved_changes() {
            let description = format!(
                "{} has unsaved changes. Save them before closing?",
                buffer.key().display_name()
            );
            self.request_confirmation(ConfirmationRequest {
                title: "Unsaved changes".to_string(),
                description,
                action: PendingAction::CloseBuffer { id: id.clone() },
            });
            return Ok(CloseOutcome::AwaitingConfirmation);
        }

        self.force_close(id);
        Ok(CloseOutcome::Closed)
    }

    pub fn close_active(&mut self) -> Result<CloseOutcome> {
        let id = self
            .buffers
            .active_id()
            .cloned()
            .ok_or_else(|| WorkspaceError::BufferNotOpen {
                id: "<none>".to_string(),
            })?;
        self.close(&id)
    }

    /// Close every buffer, asking once if any of them is dirty
    pub fn close_all(&mut self) -> CloseOutcome {
        let dirty = self.buffers.dirty_ids().len();
        if dirty > 0 {
            self.request_confirmation(ConfirmationRequest {
                title: "Unsaved changes".to_string(),
                description: format!(
                    "{} open file(s) have unsaved changes. Save them before closing?",
                    dirty
                ),
                action: PendingAction::CloseAll,
            });
            return CloseOutcome::AwaitingConfirmation;
        }

        self.clear_buffers();
        CloseOutcome::Closed
    }

    /// Answer the prompt currently shown
    pub async fn resolve_confirmation(&mut self, resolution: Resolution) -> Result<()> {
        let Some(action) = self.gate.resolve() else {
            debug!("no pending confirmation to resolve");
            return Ok(());
        };

        let result = self.run_pending(action, resolution).await;
        self.announce_prompt();
        result
    }

    async fn run_pending(&mut self, action: PendingAction, resolution: Resolution) -> Result<()> {
        match (action, resolution) {
            (PendingAction::CloseBuffer { id }, Resolution::Confirm) => {
                if self.buffers.get(&id).is_none() {
                    debug!("{} was closed while its prompt was pending", id);
                    return Ok(());
                }
                // a failed save keeps the buffer open so nothing is lost
                self.save_buffer(&id).await?;
                self.force_close(&id);
            }
            (PendingAction::CloseBuffer { id }, Resolution::Cancel) => {
                if self.buffers.discard(&id).is_ok() {
                    self.force_close(&id);
                }
            }
            (PendingAction::CloseAll, Resolution::Confirm) => {
                let report = self.save_all().await;
                for id in self.buffers.ids() {
                    if !report.failed.iter().any(|(failed, _)| *failed == id) {
                        self.force_close(&id);
                    }
                }
            }
            (PendingAction::CloseAll, Resolution::Cancel) => self.clear_buffers(),
        }
        Ok(())
    }

    /// Save a buffer and report it to the user
    pub async fn save(&mut self, id: &ProjectPath) -> Result<()> {
        self.save_buffer(id).await?;
        self.events.success(format!("Saved {}", id));
        Ok(())
    }

    pub async fn save_active(&mut self) -> Result<()> {
        let id = self
            .buffers
            .active_id()
            .cloned()
            .ok_or_else(|| WorkspaceError::BufferNotOpen {
                id: "<none>".to_string(),
            })?;
        self.save(&id).await
    }

    /// Write a buffer into the tree, the sandbox and the store.
    ///
    /// The tree is only replaced, and the buffer only marked clean, once the
    /// store accepted the new revision. A sandbox failure is logged and does
    /// not stop the save.
    pub(crate) async fn save_buffer(&mut self, id: &ProjectPath) -> Result<()> {
        let content = self
            .buffers
            .get(id)
            .ok_or_else(|| WorkspaceError::BufferNotOpen { id: id.to_string() })?
            .content()
            .to_string();

        let next = self.tree.with_file_content(id, &content)?;
        self.mirror_buffer(id, &content).await;
        self.persist(&next).await?;

        self.buffers.mark_saved(id, &content)?;
        self.commit(next);
        info!("saved {}", id);
        Ok(())
    }

    /// Save every dirty buffer.
    ///
    /// Sandbox writes go out as one concurrent batch; the buffers' contents
    /// are folded into a single tree revision and stored once. A buffer
    /// whose file no longer resolves fails alone.
    pub async fn save_all(&mut self) -> SaveReport {
        let mut report = SaveReport::default();
        let dirty = self.buffers.dirty_ids();
        if dirty.is_empty() {
            return report;
        }

        let mut next = self.tree.clone();
        let mut staged: Vec<(ProjectPath, String)> = Vec::new();
        for id in dirty {
            let Some(buffer) = self.buffers.get(&id) else {
                continue;
            };
            let content = buffer.content().to_string();
            match next.with_file_content(&id, &content) {
                Ok(tree) => {
                    next = tree;
                    staged.push((id, content));
                }
                Err(e) => {
                    warn!("cannot save {}: {}", id, e);
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        let writes = staged
            .iter()
            .filter(|(id, content)| self.scheduler.needs_mirror(id, content))
            .map(|(id, content)| {
                let sandbox = Arc::clone(&self.backends.sandbox);
                async move {
                    let result = sandbox.write_file(&id.to_string(), content).await;
                    (id, content, result)
                }
            });
        for (id, content, result) in join_all(writes).await {
            match result {
                Ok(()) => self.scheduler.record_mirrored(id, content),
                Err(reason) => log_mirror_failure(&id.to_string(), reason),
            }
        }

        if !staged.is_empty() {
            match self.persist(&next).await {
                Ok(()) => {
                    for (id, content) in &staged {
                        if self.buffers.mark_saved(id, content).is_ok() {
                            report.saved.push(id.clone());
                        }
                    }
                    self.commit(next);
                }
                Err(e) => {
                    let message = e.to_string();
                    report
                        .failed
                        .extend(staged.into_iter().map(|(id, _)| (id, message.clone())));
                }
            }
        }

        for (id, message) in &report.failed {
            self.events.error(format!("Failed to save {}: {}", id, message));
        }
        if !report.saved.is_empty() {
            self.events
                .success(format!("Saved {} file(s)", report.saved.len()));
        }
        info!(
            "save all: {} saved, {} failed",
            report.saved.len(),
            report.failed.len()
        );
        report
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Run every timer that is due at `now`
    pub async fn fire_due(&mut self, now: Instant) {
        for id in self.scheduler.take_due_mirrors(now) {
            self.fire_mirror(&id).await;
        }
        if self.scheduler.take_due_autosave(now) {
            self.fire_autosave().await;
        }
    }

    async fn fire_mirror(&mut self, id: &ProjectPath) {
        let Some(buffer) = self.buffers.get(id) else {
            debug!("mirror timer fired for closed buffer {}", id);
            return;
        };
        if self.tree.file_at(id).is_none() {
            debug!("{} no longer resolves, skipping mirror", id);
            return;
        }
        let content = buffer.content().to_string();
        self.mirror_buffer(id, &content).await;
    }

    /// The auto-save timer is shared; it saves whichever buffer is active
    /// when it fires.
    async fn fire_autosave(&mut self) {
        let Some(active) = self.buffers.active() else {
            return;
        };
        if !active.has_unsaved_changes() {
            return;
        }
        let id = active.id().clone();
        debug!("auto-saving {}", id);
        if let Err(e) = self.save_buffer(&id).await {
            self.report(&e);
        }
    }

    /// Cancel every timer and drop pending prompts
    pub fn teardown(&mut self) {
        self.scheduler.cancel_all();
        self.gate.clear();
        info!("workspace {} torn down", self.project_id);
    }

    /// Surface a failed operation to the user
    pub fn report(&self, err: &WorkspaceError) {
        if err.is_validation() {
            warn!("{}", err);
        } else {
            error!("{}", err);
        }
        self.events.error(err.to_string());
    }

    fn request_confirmation(&mut self, request: ConfirmationRequest) {
        self.gate.request(request);
        self.announce_prompt();
    }

    /// Tell the UI when the visible prompt changed
    fn announce_prompt(&mut self) {
        let event = match self.gate.refresh() {
            Some(PromptChange::Show(request)) => WorkspaceEvent::Confirm(request.clone()),
            Some(PromptChange::Cleared) => WorkspaceEvent::ConfirmCleared,
            None => return,
        };
        self.events.emit(event);
    }

    /// Remove a buffer without asking. Any prompt queued for it goes too.
    pub(crate) fn force_close(&mut self, id: &ProjectPath) -> bool {
        if self.buffers.remove(id).is_none() {
            return false;
        }
        self.scheduler.forget(id);
        self.gate.forget(id);
        if self.buffers.is_empty() {
            self.gate.forget_all();
        }
        debug!("closed buffer {}", id);
        self.announce_prompt();
        self.publish_buffers();
        true
    }

    fn clear_buffers(&mut self) {
        self.buffers.clear();
        self.scheduler.forget_all();
        self.gate.forget_all();
        self.announce_prompt();
        self.publish_buffers();
    }

    /// Mirror a buffer's content unless the sandbox already has it
    async fn mirror_buffer(&mut self, id: &ProjectPath, content: &str) {
        if !self.scheduler.needs_mirror(id, content) {
            debug!("{} already mirrored", id);
            return;
        }
        if self.sandbox_write(id, content).await {
            self.scheduler.record_mirrored(id, content);
        }
    }

    pub(crate) async fn persist(&self, tree: &Tree) -> Result<()> {
        self.backends
            .store
            .save_project(&self.project_id, &tree.to_template())
            .await
            .map_err(|reason| WorkspaceError::Persistence {
                project: self.project_id.clone(),
                reason,
            })
    }

    /// Install a revision the store has accepted
    pub(crate) fn commit(&mut self, tree: Tree) {
        self.tree = tree;
        self.events.emit(WorkspaceEvent::TreeChanged);
        self.publish_buffers();
    }

    pub(crate) fn publish_buffers(&self) {
        self.events.emit(WorkspaceEvent::Buffers {
            buffers: self.buffers.summaries(),
        });
    }

    pub(crate) async fn sandbox_write(&self, path: &ProjectPath, content: &str) -> bool {
        let path = path.to_string();
        match self.backends.sandbox.write_file(&path, content).await {
            Ok(()) => true,
            Err(reason) => {
                log_mirror_failure(&path, reason);
                false
            }
        }
    }

    pub(crate) async fn sandbox_remove_file(&self, path: &ProjectPath) -> bool {
        let path = path.to_string();
        match self.backends.sandbox.remove_file(&path).await {
            Ok(()) => true,
            Err(reason) => {
                log_mirror_failure(&path, reason);
                false
            }
        }
    }

    pub(crate) async fn sandbox_remove_dir(&self, path: &ProjectPath) -> bool {
        let path = path.to_string();
        match self.backends.sandbox.remove_directory(&path, true).await {
            Ok(()) => true,
            Err(reason) => {
                log_mirror_failure(&path, reason);
                false
            }
        }
    }

    pub(crate) async fn sandbox_make_dir(&self, path: &ProjectPath) -> bool {
        let path = path.to_string();
        match self.backends.sandbox.make_directory(&path, true).await {
            Ok(()) => true,
            Err(reason) => {
                log_mirror_failure(&path, reason);
                false
            }
        }
    }
}

fn log_mirror_failure(path: &str, reason: anyhow::Error) {
    let err = WorkspaceError::Mirror {
        path: path.to_string(),
        reason,
    };
    warn!("{}", err);
}
