use serde::Serialize;

use crate::error::{Result, WorkspaceError};
use crate::tree::{File, FileKey, ProjectPath};

/// An open, independently editable copy of a file.
///
/// A buffer is identified by the resolved path of its file. The dirty flag
/// is derived from the two contents and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBuffer {
    id: ProjectPath,
    key: FileKey,
    content: String,
    original_content: String,
}

impl OpenBuffer {
    fn new(id: ProjectPath, file: &File) -> Self {
        Self {
            id,
            key: file.key.clone(),
            content: file.content.clone(),
            original_content: file.content.clone(),
        }
    }

    pub fn id(&self) -> &ProjectPath {
        &self.id
    }

    pub fn key(&self) -> &FileKey {
        &self.key
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Last content confirmed saved to the store
    pub fn original_content(&self) -> &str {
        &self.original_content
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.content != self.original_content
    }
}

/// Tab-strip view of one buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferSummary {
    pub id: String,
    pub dirty: bool,
    pub active: bool,
}

/// Open buffers in the order they were opened, plus the active one
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: Vec<OpenBuffer>,
    active: Option<ProjectPath>,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `file` at `id` and make it active.
    ///
    /// An already open buffer is reused as is: its in-memory content wins
    /// over whatever the tree holds. Returns whether a buffer was created.
    pub fn open(&mut self, id: &ProjectPath, file: &File) -> bool {
        let created = if self.get(id).is_some() {
            false
        } else {
            self.buffers.push(OpenBuffer::new(id.clone(), file));
            true
        };
        self.active = Some(id.clone());
        created
    }

    pub fn get(&self, id: &ProjectPath) -> Option<&OpenBuffer> {
        self.buffers.iter().find(|b| b.id == *id)
    }

    fn get_mut(&mut self, id: &ProjectPath) -> Result<&mut OpenBuffer> {
        self.buffers
            .iter_mut()
            .find(|b| b.id == *id)
            .ok_or_else(|| WorkspaceError::BufferNotOpen { id: id.to_string() })
    }

    pub fn active_id(&self) -> Option<&ProjectPath> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&OpenBuffer> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    pub fn set_active(&mut self, id: &ProjectPath) -> Result<()> {
        self.get_mut(id)?;
        self.active = Some(id.clone());
        Ok(())
    }

    /// Replace the live content; returns the resulting dirty flag
    pub fn edit(&mut self, id: &ProjectPath, content: &str) -> Result<bool> {
        let buffer = self.get_mut(id)?;
        if buffer.content != content {
            buffer.content = content.to_string();
        }
        Ok(buffer.has_unsaved_changes())
    }

    /// Record that `saved` reached the store
    pub fn mark_saved(&mut self, id: &ProjectPath, saved: &str) -> Result<()> {
        let buffer = self.get_mut(id)?;
        buffer.original_content = saved.to_string();
        Ok(())
    }

    /// Drop unsaved edits
    pub fn discard(&mut self, id: &ProjectPath) -> Result<()> {
        let buffer = self.get_mut(id)?;
        buffer.content = buffer.original_content.clone();
        Ok(())
    }

    /// Remove a buffer. If it was active, the most recently opened of the
    /// remaining buffers becomes active.
    pub fn remove(&mut self, id: &ProjectPath) -> Option<OpenBuffer> {
        let index = self.buffers.iter().position(|b| b.id == *id)?;
        let removed = self.buffers.remove(index);
        if self.active.as_ref() == Some(id) {
            self.active = self.buffers.last().map(|b| b.id.clone());
        }
        Some(removed)
    }

    pub fn clear(&mut self) -> Vec<OpenBuffer> {
        self.active = None;
        std::mem::take(&mut self.buffers)
    }

    /// Point the buffer at `from` to its new location `to`
    pub fn rebind(&mut self, from: &ProjectPath, to: &ProjectPath, key: FileKey) -> bool {
        let Some(buffer) = self.buffers.iter_mut().find(|b| b.id == *from) else {
            return false;
        };
        buffer.id = to.clone();
        buffer.key = key;
        if self.active.as_ref() == Some(from) {
            self.active = Some(to.clone());
        }
        true
    }

    /// Rebind every buffer under the folder `from` onto `to`.
    /// Returns the `(old, new)` id pairs that changed.
    pub fn rebind_prefix(
        &mut self,
        from: &ProjectPath,
        to: &ProjectPath,
    ) -> Vec<(ProjectPath, ProjectPath)> {
        let mut moved = Vec::new();
        for buffer in &mut self.buffers {
            if let Some(new_id) = buffer.id.rebase(from, to) {
                moved.push((buffer.id.clone(), new_id.clone()));
                buffer.id = new_id;
            }
        }
        if let Some(active) = &self.active {
            if let Some(new_id) = active.rebase(from, to) {
                self.active = Some(new_id);
            }
        }
        moved
    }

    pub fn ids(&self) -> Vec<ProjectPath> {
        self.buffers.iter().map(|b| b.id.clone()).collect()
    }

    /// Ids of buffers whose file lives at or below `prefix`
    pub fn ids_under(&self, prefix: &ProjectPath) -> Vec<ProjectPath> {
        self.buffers
            .iter()
            .filter(|b| b.id.starts_with(prefix))
            .map(|b| b.id.clone())
            .collect()
    }

    pub fn dirty_ids(&self) -> Vec<ProjectPath> {
        self.buffers
            .iter()
            .filter(|b| b.has_unsaved_changes())
            .map(|b| b.id.clone())
            .collect()
    }

    pub fn any_dirty(&self) -> bool {
        self.buffers.iter().any(OpenBuffer::has_unsaved_changes)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn summaries(&self) -> Vec<BufferSummary> {
        self.buffers
            .iter()
            .map(|b| BufferSummary {
                id: b.id.to_string(),
                dirty: b.has_unsaved_changes(),
                active: self.active.as_ref() == Some(&b.id),
            })
            .collect()
    }
}
