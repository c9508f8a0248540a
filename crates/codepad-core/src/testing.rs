//! In-memory backends for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use codepad_platform::project::{ProjectRecord, TemplateFolder, TemplateItems, ROOT_FOLDER_NAME};
use codepad_platform::sandbox::SandboxFs;
use codepad_platform::store::{ProjectStore, TemplateLoader};

use crate::config::WorkspaceConfig;
use crate::events::{EventSink, WorkspaceEvent};
use crate::tree::{File, FileKey, Folder, Node, ProjectPath, Tree};
use crate::workspace::{Backends, Workspace};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, ProjectRecord>>,
    saves: Mutex<Vec<TemplateFolder>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn put_project(&self, id: &str, tree: Option<TemplateFolder>, template: &str) {
        self.records.lock().unwrap().insert(
            id.to_string(),
            ProjectRecord {
                id: id.to_string(),
                title: id.to_string(),
                template: template.to_string(),
                tree,
            },
        );
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn last_saved(&self) -> Option<TemplateFolder> {
        self.saves.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn load_project(&self, id: &str) -> Result<ProjectRecord> {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("project {} not found", id))
    }

    async fn save_project(&self, id: &str, tree: &TemplateFolder) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        self.saves.lock().unwrap().push(tree.clone());
        if let Some(record) = self.records.lock().unwrap().get_mut(id) {
            record.tree = Some(tree.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTemplates {
    templates: Mutex<HashMap<String, TemplateItems>>,
}

impl MemoryTemplates {
    pub fn put(&self, id: &str, items: TemplateItems) {
        self.templates.lock().unwrap().insert(id.to_string(), items);
    }
}

#[async_trait]
impl TemplateLoader for MemoryTemplates {
    async fn load_template(&self, id: &str) -> Result<TemplateItems> {
        self.templates
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown template {}", id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxCall {
    Write { path: String, content: String },
    RemoveFile { path: String },
    RemoveDir { path: String, recursive: bool },
    MakeDir { path: String, recursive: bool },
}

/// Records every accepted call; a failing sandbox records nothing
#[derive(Default)]
pub struct RecordingSandbox {
    calls: Mutex<Vec<SandboxCall>>,
    failing: AtomicBool,
}

impl RecordingSandbox {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SandboxCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SandboxCall::Write { path, content } => Some((path, content)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: SandboxCall) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("sandbox unavailable");
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl SandboxFs for RecordingSandbox {
    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.record(SandboxCall::Write {
            path: path.to_string(),
            content: content.to_string(),
        })
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        self.record(SandboxCall::RemoveFile {
            path: path.to_string(),
        })
    }

    async fn remove_directory(&self, path: &str, recursive: bool) -> Result<()> {
        self.record(SandboxCall::RemoveDir {
            path: path.to_string(),
            recursive,
        })
    }

    async fn make_directory(&self, path: &str, recursive: bool) -> Result<()> {
        self.record(SandboxCall::MakeDir {
            path: path.to_string(),
            recursive,
        })
    }
}

pub struct Harness {
    pub workspace: Workspace,
    pub store: Arc<MemoryStore>,
    pub templates: Arc<MemoryTemplates>,
    pub sandbox: Arc<RecordingSandbox>,
    pub events: mpsc::UnboundedReceiver<WorkspaceEvent>,
}

/// A workspace over `tree` with default timings and in-memory backends
pub fn harness(tree: Tree) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let templates = Arc::new(MemoryTemplates::default());
    let sandbox = Arc::new(RecordingSandbox::default());
    let (sink, events) = EventSink::channel();
    let backends = Backends {
        store: store.clone(),
        templates: templates.clone(),
        sandbox: sandbox.clone(),
    };
    let workspace =
        Workspace::new("demo", backends, &WorkspaceConfig::default(), sink).with_tree(tree);
    Harness {
        workspace,
        store,
        templates,
        sandbox,
        events,
    }
}

/// Root { a.ts, old.js, src { index.ts, lib { util.ts } } }
pub fn sample_tree() -> Tree {
    fn file(name: &str, content: &str) -> Node {
        Node::File(Arc::new(File::new(FileKey::from_name(name), content)))
    }
    fn folder(name: &str, items: Vec<Node>) -> Node {
        Node::Folder(Arc::new(Folder::with_items(name, items)))
    }
    Tree::new(Folder::with_items(
        ROOT_FOLDER_NAME,
        vec![
            file("a.ts", "x"),
            folder(
                "src",
                vec![
                    file("index.ts", "main"),
                    folder("lib", vec![file("util.ts", "util")]),
                ],
            ),
            file("old.js", "legacy"),
        ],
    ))
}

/// Content of the file at `path` in a persisted tree
pub fn file_content(tree: &TemplateFolder, path: &str) -> Option<String> {
    Tree::from_template(tree)
        .file_at(&ProjectPath::parse(path))
        .map(|file| file.content.clone())
}

pub fn drain(events: &mut mpsc::UnboundedReceiver<WorkspaceEvent>) -> Vec<WorkspaceEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
