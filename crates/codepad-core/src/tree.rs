//! Project tree model.
//!
//! The tree is a persistent value: folders and files sit behind `Arc`s and a
//! mutation path-copies only the folders between the root and the change, so
//! every revision shares its untouched subtrees with the previous one. A
//! `Tree` handed out to a reader is a stable snapshot.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use codepad_platform::project::{TemplateFile, TemplateFolder, TemplateItem, ROOT_FOLDER_NAME};

use crate::error::{Result, WorkspaceError};

/// Slash-delimited location of a node, relative to the root folder.
///
/// The root's own name is never part of a path: a file directly under the
/// root has the one-segment path `index.ts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProjectPath(Vec<String>);

impl ProjectPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse `a/b/c.ts`; empty segments are ignored
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }

    /// Last segment
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Whether `prefix` is this path or one of its ancestors
    pub fn starts_with(&self, prefix: &ProjectPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Re-root this path from `from` onto `to`, if it lives under `from`
    pub fn rebase(&self, from: &ProjectPath, to: &ProjectPath) -> Option<Self> {
        let rest = self.0.strip_prefix(from.0.as_slice())?;
        let mut segments = to.0.clone();
        segments.extend(rest.iter().cloned());
        Some(Self(segments))
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl From<String> for ProjectPath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&str> for ProjectPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<ProjectPath> for String {
    fn from(path: ProjectPath) -> Self {
        path.to_string()
    }
}

/// Identity of a file within its folder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub filename: String,
    pub extension: String,
}

impl FileKey {
    pub fn new(filename: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            extension: extension.into(),
        }
    }

    /// Split a display name at its last dot: `app.test.ts` -> (`app.test`, `ts`).
    /// Names without a stem before the dot (`.env`) keep an empty extension.
    pub fn from_name(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Self::new(stem, ext),
            _ => Self::new(name, ""),
        }
    }

    /// `filename.extension`, or the bare filename when the extension is empty
    pub fn display_name(&self) -> String {
        if self.extension.is_empty() {
            self.filename.clone()
        } else {
            format!("{}.{}", self.filename, self.extension)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub key: FileKey,
    pub content: String,
}

impl File {
    pub fn new(key: FileKey, content: impl Into<String>) -> Self {
        Self {
            key,
            content: content.into(),
        }
    }

    pub fn display_name(&self) -> String {
        self.key.display_name()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub name: String,
    pub items: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(Arc<File>),
    Folder(Arc<Folder>),
}

impl Node {
    /// Name of the node inside its parent folder
    pub fn name(&self) -> String {
        match self {
            Node::File(file) => file.display_name(),
            Node::Folder(folder) => folder.name.clone(),
        }
    }
}

impl Folder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn with_items(name: impl Into<String>, items: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    pub fn file(&self, name: &str) -> Option<&File> {
        self.items.iter().find_map(|node| match node {
            Node::File(file) if file.display_name() == name => Some(file.as_ref()),
            _ => None,
        })
    }

    pub fn folder(&self, name: &str) -> Option<&Folder> {
        self.items.iter().find_map(|node| match node {
            Node::Folder(folder) if folder.name == name => Some(folder.as_ref()),
            _ => None,
        })
    }

    /// Whether any direct child, file or folder, is called `name`
    pub fn contains_name(&self, name: &str) -> bool {
        self.items.iter().any(|node| node.name() == name)
    }

    fn position_file(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|node| matches!(node, Node::File(file) if file.display_name() == name))
    }

    fn position_folder(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|node| matches!(node, Node::Folder(folder) if folder.name == name))
    }

    fn insert(&mut self, parent: &ProjectPath, node: Node) -> Result<()> {
        let name = node.name();
        if self.contains_name(&name) {
            return Err(WorkspaceError::AlreadyExists {
                path: parent.join(&name).to_string(),
            });
        }
        self.items.push(node);
        Ok(())
    }
}

impl From<&TemplateFolder> for Folder {
    fn from(template: &TemplateFolder) -> Self {
        let items = template
            .items
            .iter()
            .map(|item| match item {
                TemplateItem::Folder(folder) => Node::Folder(Arc::new(Folder::from(folder))),
                TemplateItem::File(file) => Node::File(Arc::new(File::new(
                    FileKey::new(&file.filename, &file.file_extension),
                    file.content.clone(),
                ))),
            })
            .collect();
        Folder::with_items(&template.folder_name, items)
    }
}

impl From<&Folder> for TemplateFolder {
    fn from(folder: &Folder) -> Self {
        TemplateFolder {
            folder_name: folder.name.clone(),
            items: folder
                .items
                .iter()
                .map(|node| match node {
                    Node::Folder(child) => TemplateItem::Folder(TemplateFolder::from(child.as_ref())),
                    Node::File(file) => TemplateItem::File(TemplateFile {
                        filename: file.key.filename.clone(),
                        file_extension: file.key.extension.clone(),
                        content: file.content.clone(),
                    }),
                })
                .collect(),
        }
    }
}

/// Reject names that cannot be a single path segment
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(WorkspaceError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Path of the first file matching `target` in a depth-first pre-order walk.
///
/// Returns `None` when no file with that identity is reachable, which is how
/// a stale buffer reference shows up.
pub fn resolve_path(target: &FileKey, root: &Folder) -> Option<ProjectPath> {
    fn walk(target: &FileKey, folder: &Folder, prefix: &mut Vec<String>) -> Option<ProjectPath> {
        for node in &folder.items {
            match node {
                Node::Folder(child) => {
                    prefix.push(child.name.clone());
                    let found = walk(target, child, prefix);
                    prefix.pop();
                    if found.is_some() {
                        return found;
                    }
                }
                Node::File(file) if file.key == *target => {
                    let mut segments = prefix.clone();
                    segments.push(file.display_name());
                    return Some(ProjectPath(segments));
                }
                Node::File(_) => {}
            }
        }
        None
    }

    walk(target, root, &mut Vec::new())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    root: Arc<Folder>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(Folder::new(ROOT_FOLDER_NAME))
    }
}

impl Tree {
    pub fn new(root: Folder) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn from_template(template: &TemplateFolder) -> Self {
        Self::new(Folder::from(template))
    }

    pub fn to_template(&self) -> TemplateFolder {
        TemplateFolder::from(self.root.as_ref())
    }

    pub fn root(&self) -> &Folder {
        &self.root
    }

    pub fn folder_at(&self, path: &ProjectPath) -> Option<&Folder> {
        path.segments()
            .iter()
            .try_fold(self.root.as_ref(), |folder, segment| folder.folder(segment))
    }

    pub fn file_at(&self, path: &ProjectPath) -> Option<&File> {
        let (name, parent) = path.segments().split_last()?;
        let parent = parent
            .iter()
            .try_fold(self.root.as_ref(), |folder, segment| folder.folder(segment))?;
        parent.file(name)
    }

    /// Like `folder_at`, but names the first segment that does not resolve
    pub fn require_folder(&self, path: &ProjectPath) -> Result<&Folder> {
        let mut folder = self.root.as_ref();
        for (depth, segment) in path.segments().iter().enumerate() {
            folder = folder
                .folder(segment)
                .ok_or_else(|| WorkspaceError::FolderNotFound {
                    path: ProjectPath(path.segments()[..=depth].to_vec()).to_string(),
                })?;
        }
        Ok(folder)
    }

    pub fn require_file(&self, path: &ProjectPath) -> Result<&File> {
        let parent = path.parent().ok_or_else(|| WorkspaceError::FileNotFound {
            path: path.to_string(),
        })?;
        self.require_folder(&parent)?;
        self.file_at(path).ok_or_else(|| WorkspaceError::FileNotFound {
            path: path.to_string(),
        })
    }

    /// Every file with its path, in depth-first pre-order
    pub fn files(&self) -> Vec<(ProjectPath, &File)> {
        let mut out = Vec::new();
        collect(&self.root, &ProjectPath::root(), &mut out, &mut Vec::new());
        out
    }

    /// Every folder below the root, parents before children
    pub fn folders(&self) -> Vec<ProjectPath> {
        let mut out = Vec::new();
        collect(&self.root, &ProjectPath::root(), &mut Vec::new(), &mut out);
        out
    }

    /// Files and folders at or below `path`
    pub fn subtree(&self, path: &ProjectPath) -> (Vec<(ProjectPath, &File)>, Vec<ProjectPath>) {
        let mut files = Vec::new();
        let mut folders = Vec::new();
        if let Some(folder) = self.folder_at(path) {
            if !path.is_root() {
                folders.push(path.clone());
            }
            collect(folder, path, &mut files, &mut folders);
        }
        (files, folders)
    }

    /// Apply `edit` to a path-copied folder and return the new revision
    fn edit_folder<T>(
        &self,
        path: &ProjectPath,
        edit: impl FnOnce(&mut Folder) -> Result<T>,
    ) -> Result<(Tree, T)> {
        self.require_folder(path)?;

        let mut root = Arc::clone(&self.root);
        let mut folder: &mut Folder = Arc::make_mut(&mut root);
        for segment in path.segments() {
            let current = folder;
            folder = current
                .items
                .iter_mut()
                .find_map(|node| match node {
                    Node::Folder(child) if child.name == *segment => Some(Arc::make_mut(child)),
                    _ => None,
                })
                .ok_or_else(|| WorkspaceError::FolderNotFound {
                    path: path.to_string(),
                })?;
        }
        let value = edit(folder)?;
        Ok((Tree { root }, value))
    }

    pub fn with_file_content(&self, path: &ProjectPath, content: &str) -> Result<Tree> {
        let (parent, name) = split_leaf(path)?;
        let (tree, ()) = self.edit_folder(&parent, |folder| {
            let file = folder
                .items
                .iter_mut()
                .find_map(|node| match node {
                    Node::File(file) if file.display_name() == name => Some(file),
                    _ => None,
                })
                .ok_or_else(|| WorkspaceError::FileNotFound {
                    path: path.to_string(),
                })?;
            Arc::make_mut(file).content = content.to_string();
            Ok(())
        })?;
        Ok(tree)
    }

    pub fn with_node_added(&self, parent: &ProjectPath, node: Node) -> Result<Tree> {
        let (tree, ()) = self.edit_folder(parent, |folder| folder.insert(parent, node))?;
        Ok(tree)
    }

    pub fn without_file(&self, path: &ProjectPath) -> Result<(Tree, Arc<File>)> {
        let (parent, name) = split_leaf(path)?;
        self.edit_folder(&parent, |folder| {
            let index = folder
                .position_file(&name)
                .ok_or_else(|| WorkspaceError::FileNotFound {
                    path: path.to_string(),
                })?;
            let Node::File(file) = &folder.items[index] else {
                return Err(WorkspaceError::FileNotFound {
                    path: path.to_string(),
                });
            };
            let file = Arc::clone(file);
            folder.items.remove(index);
            Ok(file)
        })
    }

    pub fn without_folder(&self, path: &ProjectPath) -> Result<(Tree, Arc<Folder>)> {
        let (parent, name) = split_leaf(path)?;
        self.edit_folder(&parent, |folder| {
            let index = folder
                .position_folder(&name)
                .ok_or_else(|| WorkspaceError::FolderNotFound {
                    path: path.to_string(),
                })?;
            let Node::Folder(removed) = &folder.items[index] else {
                return Err(WorkspaceError::FolderNotFound {
                    path: path.to_string(),
                });
            };
            let removed = Arc::clone(removed);
            folder.items.remove(index);
            Ok(removed)
        })
    }

    /// Rename a file in place, keeping its position and content
    pub fn with_file_renamed(&self, path: &ProjectPath, key: FileKey) -> Result<Tree> {
        let (parent, name) = split_leaf(path)?;
        let new_name = key.display_name();
        let (tree, ()) = self.edit_folder(&parent, |folder| {
            let index = folder
                .position_file(&name)
                .ok_or_else(|| WorkspaceError::FileNotFound {
                    path: path.to_string(),
                })?;
            if new_name != name && folder.contains_name(&new_name) {
                return Err(WorkspaceError::AlreadyExists {
                    path: parent.join(&new_name).to_string(),
                });
            }
            if let Node::File(file) = &mut folder.items[index] {
                Arc::make_mut(file).key = key;
            }
            Ok(())
        })?;
        Ok(tree)
    }

    /// Rename a folder in place; its subtree is shared, not copied
    pub fn with_folder_renamed(&self, path: &ProjectPath, new_name: &str) -> Result<Tree> {
        let (parent, name) = split_leaf(path)?;
        let (tree, ()) = self.edit_folder(&parent, |folder| {
            let index = folder
                .position_folder(&name)
                .ok_or_else(|| WorkspaceError::FolderNotFound {
                    path: path.to_string(),
                })?;
            if new_name != name && folder.contains_name(new_name) {
                return Err(WorkspaceError::AlreadyExists {
                    path: parent.join(new_name).to_string(),
                });
            }
            if let Node::Folder(child) = &mut folder.items[index] {
                Arc::make_mut(child).name = new_name.to_string();
            }
            Ok(())
        })?;
        Ok(tree)
    }

    /// Move a file under another folder
    pub fn with_file_moved(&self, path: &ProjectPath, destination: &ProjectPath) -> Result<Tree> {
        self.require_folder(destination)?;
        let (without, file) = self.without_file(path)?;
        without.with_node_added(destination, Node::File(file))
    }
}

fn split_leaf(path: &ProjectPath) -> Result<(ProjectPath, String)> {
    match (path.parent(), path.name()) {
        (Some(parent), Some(name)) => Ok((parent, name.to_string())),
        _ => Err(WorkspaceError::InvalidName {
            name: ROOT_FOLDER_NAME.to_string(),
        }),
    }
}

fn collect<'a>(
    folder: &'a Folder,
    prefix: &ProjectPath,
    files: &mut Vec<(ProjectPath, &'a File)>,
    folders: &mut Vec<ProjectPath>,
) {
    for node in &folder.items {
        match node {
            Node::File(file) => files.push((prefix.join(&file.display_name()), file.as_ref())),
            Node::Folder(child) => {
                let path = prefix.join(&child.name);
                folders.push(path.clone());
                collect(child, &path, files, folders);
            }
        }
    }
}
