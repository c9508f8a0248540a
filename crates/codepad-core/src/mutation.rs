//! Structural edits to the project tree.
//!
//! Every operation validates against the current tree, builds the next
//! revision, and hands it to the store. Only once the store accepted it are
//! the open buffers reconciled and the revision installed; the sandbox is
//! updated last and its failures are logged, not propagated.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, WorkspaceError};
use crate::tree::{validate_name, File, FileKey, Folder, Node, ProjectPath, Tree};
use crate::workspace::Workspace;

impl Workspace {
    /// Create the file `name` inside the folder at `parent`
    pub async fn add_file(
        &mut self,
        parent: &ProjectPath,
        name: &str,
        content: &str,
    ) -> Result<ProjectPath> {
        validate_name(name)?;
        let key = FileKey::from_name(name);
        let path = parent.join(&key.display_name());
        let next = self
            .tree
            .with_node_added(parent, Node::File(Arc::new(File::new(key, content))))?;

        self.persist(&next).await?;
        self.commit(next);
        self.sandbox_write(&path, content).await;

        info!("created file {}", path);
        self.events.success(format!("Created {}", path));
        Ok(path)
    }

    /// Create an empty folder `name` inside the folder at `parent`
    pub async fn add_folder(&mut self, parent: &ProjectPath, name: &str) -> Result<ProjectPath> {
        validate_name(name)?;
        let path = parent.join(name);
        let next = self
            .tree
            .with_node_added(parent, Node::Folder(Arc::new(Folder::new(name))))?;

        self.persist(&next).await?;
        self.commit(next);
        self.sandbox_make_dir(&path).await;

        info!("created folder {}", path);
        self.events.success(format!("Created {}", path));
        Ok(path)
    }

    /// Delete a file, closing its buffer without a prompt
    pub async fn delete_file(&mut self, path: &ProjectPath) -> Result<()> {
        let (next, _) = self.tree.without_file(path)?;

        self.persist(&next).await?;
        if self.force_close(path) {
            debug!("closed buffer of deleted file {}", path);
        }
        self.commit(next);
        self.sandbox_remove_file(path).await;

        info!("deleted file {}", path);
        self.events.success(format!("Deleted {}", path));
        Ok(())
    }

    /// Delete a folder and everything below it. Buffers inside it are closed
    /// without a prompt, dirty or not.
    pub async fn delete_folder(&mut self, path: &ProjectPath) -> Result<()> {
        reject_root(path)?;
        let (next, _) = self.tree.without_folder(path)?;

        self.persist(&next).await?;
        let closed = self.buffers.ids_under(path);
        for id in &closed {
            self.force_close(id);
        }
        self.commit(next);
        self.sandbox_remove_dir(path).await;

        info!("deleted folder {} ({} buffer(s) closed)", path, closed.len());
        self.events.success(format!("Deleted {}", path));
        Ok(())
    }

    /// Rename a file within its folder; an open buffer follows it
    pub async fn rename_file(&mut self, path: &ProjectPath, new_name: &str) -> Result<ProjectPath> {
        validate_name(new_name)?;
        let key = FileKey::from_name(new_name);
        let parent = path.parent().ok_or_else(|| WorkspaceError::InvalidName {
            name: path.to_string(),
        })?;
        let new_path = parent.join(&key.display_name());
        if new_path == *path {
            self.tree.require_file(path)?;
            return Ok(new_path);
        }
        let next = self.tree.with_file_renamed(path, key)?;

        self.persist(&next).await?;
        self.relocate_buffer(&next, path, &new_path);
        self.commit(next);
        self.relocate_file_in_sandbox(path, &new_path).await;

        info!("renamed {} to {}", path, new_path);
        self.events.success(format!("Renamed {} to {}", path, new_path));
        Ok(new_path)
    }

    /// Rename a folder; buffers below it are rebound to the new prefix
    pub async fn rename_folder(
        &mut self,
        path: &ProjectPath,
        new_name: &str,
    ) -> Result<ProjectPath> {
        reject_root(path)?;
        validate_name(new_name)?;
        let parent = path.parent().ok_or_else(|| WorkspaceError::InvalidName {
            name: path.to_string(),
        })?;
        let new_path = parent.join(new_name);
        if new_path == *path {
            self.tree.require_folder(path)?;
            return Ok(new_path);
        }
        let next = self.tree.with_folder_renamed(path, new_name)?;

        self.persist(&next).await?;
        for (old, new) in self.buffers.rebind_prefix(path, &new_path) {
            self.scheduler.rebind(&old, &new);
            self.gate.rebind(&old, &new);
        }
        self.commit(next);
        self.relocate_folder_in_sandbox(path, &new_path).await;

        info!("renamed folder {} to {}", path, new_path);
        self.events.success(format!("Renamed {} to {}", path, new_path));
        Ok(new_path)
    }

    /// Move a file into another folder, keeping its name
    pub async fn move_file(
        &mut self,
        path: &ProjectPath,
        destination: &ProjectPath,
    ) -> Result<ProjectPath> {
        let name = path.name().ok_or_else(|| WorkspaceError::InvalidName {
            name: path.to_string(),
        })?;
        let new_path = destination.join(name);
        if new_path == *path {
            self.tree.require_file(path)?;
            return Ok(new_path);
        }
        let next = self.tree.with_file_moved(path, destination)?;

        self.persist(&next).await?;
        self.relocate_buffer(&next, path, &new_path);
        self.commit(next);
        self.relocate_file_in_sandbox(path, &new_path).await;

        info!("moved {} to {}", path, new_path);
        self.events.success(format!("Moved {} to {}", path, new_path));
        Ok(new_path)
    }

    /// Follow a file to `to` in `next`, keeping the key the tree holds for it
    fn relocate_buffer(&mut self, next: &Tree, from: &ProjectPath, to: &ProjectPath) {
        let Some(key) = next.file_at(to).map(|file| file.key.clone()) else {
            return;
        };
        if self.buffers.rebind(from, to, key) {
            self.scheduler.rebind(from, to);
            self.gate.rebind(from, to);
            debug!("buffer {} now at {}", from, to);
        }
    }

    /// Content the sandbox should hold for `path`: the live buffer if one is
    /// open, otherwise the saved file
    fn sandbox_content(&self, path: &ProjectPath) -> Option<String> {
        match self.buffers.get(path) {
            Some(buffer) => Some(buffer.content().to_string()),
            None => self.tree.file_at(path).map(|file| file.content.clone()),
        }
    }

    async fn relocate_file_in_sandbox(&mut self, from: &ProjectPath, to: &ProjectPath) {
        if let Some(content) = self.sandbox_content(to) {
            if self.sandbox_write(to, &content).await && self.buffers.get(to).is_some() {
                self.scheduler.record_mirrored(to, &content);
            }
        }
        self.sandbox_remove_file(from).await;
    }

    async fn relocate_folder_in_sandbox(&mut self, from: &ProjectPath, to: &ProjectPath) {
        let (files, folders) = self.tree.subtree(to);
        let files: Vec<ProjectPath> = files.into_iter().map(|(path, _)| path).collect();

        for folder in &folders {
            self.sandbox_make_dir(folder).await;
        }
        for path in &files {
            let Some(content) = self.sandbox_content(path) else {
                continue;
            };
            if self.sandbox_write(path, &content).await && self.buffers.get(path).is_some() {
                self.scheduler.record_mirrored(path, &content);
            }
        }
        self.sandbox_remove_dir(from).await;
    }
}

fn reject_root(path: &ProjectPath) -> Result<()> {
    if path.is_root() {
        return Err(WorkspaceError::InvalidName {
            name: codepad_platform::project::ROOT_FOLDER_NAME.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use codepad_platform::project::ROOT_FOLDER_NAME;

    use crate::confirm::{PendingAction, Resolution};
    use crate::error::WorkspaceError;
    use crate::events::{NoticeLevel, WorkspaceEvent};
    use crate::testing::{drain, file_content, harness, sample_tree, SandboxCall};
    use crate::tree::{File, FileKey, Folder, Node, ProjectPath, Tree};
    use crate::workspace::CloseOutcome;

    fn p(path: &str) -> ProjectPath {
        ProjectPath::parse(path)
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_file_persists_and_mirrors() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        let path = ws.add_file(&p("src"), "app.tsx", "").await.unwrap();
        assert_eq!(path, p("src/app.tsx"));

        let saved = h.store.last_saved().unwrap();
        assert_eq!(file_content(&saved, "src/app.tsx").as_deref(), Some(""));
        assert_eq!(ws.tree().file_at(&path).unwrap().key.extension, "tsx");
        assert_eq!(h.sandbox.writes(), vec![("src/app.tsx".to_string(), String::new())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_under_missing_parent_touches_nothing() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        let before = ws.tree().clone();
        let err = ws.add_file(&p("docs/api"), "x.md", "").await.unwrap_err();
        match err {
            WorkspaceError::FolderNotFound { path } => assert_eq!(path, "docs"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ws.tree(), &before);
        assert_eq!(h.store.save_count(), 0);
        assert!(h.sandbox.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_duplicate_name_rejected() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        let err = ws.add_folder(&ProjectPath::root(), "a.ts").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists { .. }));
        let err = ws.add_file(&ProjectPath::root(), "bad/name.ts", "").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidName { .. }));
        assert_eq!(h.store.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_folder_makes_directory() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        ws.add_folder(&p("src"), "components").await.unwrap();
        assert!(ws.tree().folder_at(&p("src/components")).is_some());
        assert_eq!(
            h.sandbox.calls(),
            vec![SandboxCall::MakeDir {
                path: "src/components".to_string(),
                recursive: true
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_folder_closes_dirty_buffers_without_prompt() {
        let mut h = harness(sample_tree());
        let mut ws = h.workspace;
        ws.open(&p("a.ts")).unwrap();
        ws.open(&p("src/index.ts")).unwrap();
        ws.open(&p("src/lib/util.ts")).unwrap();
        ws.edit_buffer(&p("src/index.ts"), "changed").unwrap();
        ws.edit_buffer(&p("src/lib/util.ts"), "changed").unwrap();
        drain(&mut h.events);

        ws.delete_folder(&p("src")).await.unwrap();

        assert_eq!(ws.buffers().ids(), vec![p("a.ts")]);
        assert!(!ws.gate().is_open());
        assert!(ws.tree().folder_at(&p("src")).is_none());
        let saved = h.store.last_saved().unwrap();
        assert!(file_content(&saved, "src/index.ts").is_none());
        assert_eq!(
            h.sandbox.calls(),
            vec![SandboxCall::RemoveDir {
                path: "src".to_string(),
                recursive: true
            }]
        );
        let events = drain(&mut h.events);
        assert!(!events.iter().any(|e| matches!(e, WorkspaceEvent::Confirm(_))));
        assert!(events.contains(&WorkspaceEvent::TreeChanged));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_drops_pending_close_prompt() {
        let mut h = harness(sample_tree());
        let mut ws = h.workspace;
        ws.open(&p("a.ts")).unwrap();
        ws.edit("y").unwrap();
        assert_eq!(ws.close(&p("a.ts")).unwrap(), CloseOutcome::AwaitingConfirmation);
        drain(&mut h.events);

        ws.delete_file(&p("a.ts")).await.unwrap();
        assert!(!ws.gate().is_open());
        let events = drain(&mut h.events);
        assert!(events.iter().any(|e| matches!(e, WorkspaceEvent::ConfirmCleared)));

        // a new file at the same path is not touched by the old prompt
        ws.add_file(&ProjectPath::root(), "a.ts", "fresh").await.unwrap();
        ws.open(&p("a.ts")).unwrap();
        ws.edit("new work").unwrap();
        ws.resolve_confirmation(Resolution::Cancel).await.unwrap();
        assert_eq!(ws.buffers().get(&p("a.ts")).unwrap().content(), "new work");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_shows_next_queued_prompt() {
        let mut h = harness(sample_tree());
        let mut ws = h.workspace;
        ws.open(&p("a.ts")).unwrap();
        ws.open(&p("old.js")).unwrap();
        ws.edit_buffer(&p("a.ts"), "y").unwrap();
        ws.edit_buffer(&p("old.js"), "z").unwrap();
        ws.close(&p("a.ts")).unwrap();
        ws.close(&p("old.js")).unwrap();
        drain(&mut h.events);

        ws.delete_file(&p("a.ts")).await.unwrap();
        let shown: Vec<_> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                WorkspaceEvent::Confirm(request) => Some(request.action),
                _ => None,
            })
            .collect();
        assert_eq!(shown, vec![PendingAction::CloseBuffer { id: p("old.js") }]);
        assert_eq!(ws.gate().queued(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_root_rejected() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        let err = ws.delete_folder(&ProjectPath::root()).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidName { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_aborts_delete() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        let before = ws.tree().clone();
        ws.open(&p("a.ts")).unwrap();
        h.store.set_failing(true);

        let err = ws.delete_file(&p("a.ts")).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::Persistence { .. }));
        assert_eq!(ws.tree(), &before);
        assert!(ws.buffers().get(&p("a.ts")).is_some());
        assert!(h.sandbox.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_file_removes_from_sandbox() {
        let mut h = harness(sample_tree());
        let mut ws = h.workspace;
        ws.open(&p("a.ts")).unwrap();
        ws.edit("y").unwrap();
        ws.delete_file(&p("a.ts")).await.unwrap();

        assert!(ws.buffers().is_empty());
        assert!(ws.tree().file_at(&p("a.ts")).is_none());
        assert_eq!(
            h.sandbox.calls(),
            vec![SandboxCall::RemoveFile {
                path: "a.ts".to_string()
            }]
        );
        let notices: Vec<_> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                WorkspaceEvent::Notice { level, message } => Some((level, message)),
                _ => None,
            })
            .collect();
        assert_eq!(notices, vec![(NoticeLevel::Success, "Deleted a.ts".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_file_rebinds_buffer_and_sandbox() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        ws.open(&p("old.js")).unwrap();
        ws.edit("draft").unwrap();

        let new_path = ws.rename_file(&p("old.js"), "new.js").await.unwrap();
        assert_eq!(new_path, p("new.js"));

        let buffer = ws.buffers().get(&p("new.js")).unwrap();
        assert_eq!(buffer.content(), "draft");
        assert!(buffer.has_unsaved_changes());
        assert!(ws.buffers().get(&p("old.js")).is_none());
        assert_eq!(ws.buffers().active_id(), Some(&p("new.js")));
        assert_eq!(ws.tree().file_at(&p("new.js")).unwrap().content, "legacy");

        assert_eq!(
            h.sandbox.calls(),
            vec![
                SandboxCall::Write {
                    path: "new.js".to_string(),
                    content: "draft".to_string()
                },
                SandboxCall::RemoveFile {
                    path: "old.js".to_string()
                },
            ]
        );
        assert_eq!(ws.scheduler().watermark(&p("new.js")), Some("draft"));
        assert!(ws.scheduler().mirror_pending(&p("new.js")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_file_follows_pending_close_prompt() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        ws.open(&p("old.js")).unwrap();
        ws.edit("draft").unwrap();
        assert_eq!(ws.close(&p("old.js")).unwrap(), CloseOutcome::AwaitingConfirmation);

        ws.rename_file(&p("old.js"), "new.js").await.unwrap();
        assert_eq!(
            ws.gate().current().unwrap().action,
            PendingAction::CloseBuffer { id: p("new.js") }
        );

        ws.resolve_confirmation(Resolution::Confirm).await.unwrap();
        assert!(ws.buffers().is_empty());
        let saved = h.store.last_saved().unwrap();
        assert_eq!(file_content(&saved, "new.js").as_deref(), Some("draft"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_onto_sibling_rejected() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        let err = ws.rename_file(&p("old.js"), "a.ts").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists { .. }));
        assert_eq!(h.store.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rename_folder_migrates_buffers_and_sandbox() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        ws.open(&p("src/lib/util.ts")).unwrap();
        ws.edit("tweaked").unwrap();

        let new_path = ws.rename_folder(&p("src"), "app").await.unwrap();
        assert_eq!(new_path, p("app"));
        assert_eq!(ws.buffers().ids(), vec![p("app/lib/util.ts")]);
        assert!(ws.tree().file_at(&p("app/index.ts")).is_some());

        let calls = h.sandbox.calls();
        assert_eq!(
            calls.first(),
            Some(&SandboxCall::MakeDir {
                path: "app".to_string(),
                recursive: true
            })
        );
        assert_eq!(
            calls.last(),
            Some(&SandboxCall::RemoveDir {
                path: "src".to_string(),
                recursive: true
            })
        );
        assert!(h
            .sandbox
            .writes()
            .contains(&("app/lib/util.ts".to_string(), "tweaked".to_string())));
        assert!(h
            .sandbox
            .writes()
            .contains(&("app/index.ts".to_string(), "main".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_file_into_folder() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        ws.open(&p("a.ts")).unwrap();

        let new_path = ws.move_file(&p("a.ts"), &p("src/lib")).await.unwrap();
        assert_eq!(new_path, p("src/lib/a.ts"));
        assert!(ws.tree().file_at(&p("a.ts")).is_none());
        assert_eq!(ws.tree().file_at(&new_path).unwrap().content, "x");
        assert_eq!(ws.buffers().active_id(), Some(&new_path));
    }

    #[tokio::test(start_paused = true)]
    async fn test_move_keeps_the_tree_file_key() {
        let tree = Tree::new(Folder::with_items(
            ROOT_FOLDER_NAME,
            vec![
                Node::File(Arc::new(File::new(FileKey::new("a.b", ""), "dotted"))),
                Node::Folder(Arc::new(Folder::new("src"))),
            ],
        ));
        let h = harness(tree);
        let mut ws = h.workspace;
        ws.open(&p("a.b")).unwrap();

        let new_path = ws.move_file(&p("a.b"), &p("src")).await.unwrap();
        assert_eq!(new_path, p("src/a.b"));
        let buffer = ws.buffers().get(&new_path).unwrap();
        assert_eq!(buffer.key(), &FileKey::new("a.b", ""));
        assert_eq!(buffer.key(), &ws.tree().file_at(&new_path).unwrap().key);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sandbox_failure_does_not_abort_mutation() {
        let h = harness(sample_tree());
        let mut ws = h.workspace;
        h.sandbox.set_failing(true);
        ws.add_file(&ProjectPath::root(), "notes.md", "hi").await.unwrap();
        assert!(ws.tree().file_at(&p("notes.md")).is_some());
        assert_eq!(h.store.save_count(), 1);
    }
}
