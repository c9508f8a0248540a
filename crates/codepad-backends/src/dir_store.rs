use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use codepad_platform::project::{ProjectRecord, TemplateFolder};
use codepad_platform::store::ProjectStore;

use crate::check_id;

/// Project store keeping one `<id>.json` record per project in a directory
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        check_id(id)?;
        Ok(self.root.join(format!("{}.json", id)))
    }

    /// Register a new project seeded from `template`. An existing record is
    /// left alone.
    pub async fn create_project(&self, id: &str, title: &str, template: &str) -> Result<bool> {
        let path = self.record_path(id)?;
        let exists = tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("failed to check {}", path.display()))?;
        if exists {
            debug!("project {} already exists", id);
            return Ok(false);
        }
        let record = ProjectRecord {
            id: id.to_string(),
            title: title.to_string(),
            template: template.to_string(),
            tree: None,
        };
        write_record(&path, &record).await?;
        info!("created project {} from template {:?}", id, template);
        Ok(true)
    }

    async fn read_record(&self, id: &str) -> Result<ProjectRecord> {
        let path = self.record_path(id)?;
        let data = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read project {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse project {}", path.display()))
    }
}

#[async_trait]
impl ProjectStore for DirStore {
    async fn load_project(&self, id: &str) -> Result<ProjectRecord> {
        self.read_record(id).await
    }

    async fn save_project(&self, id: &str, tree: &TemplateFolder) -> Result<()> {
        let mut record = self.read_record(id).await?;
        record.tree = Some(tree.clone());
        write_record(&self.record_path(id)?, &record).await
    }
}

/// Write through a temp file and rename, so a crash never leaves half a record
async fn write_record(path: &Path, record: &ProjectRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create store dir {}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(record)?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, data)
        .await
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("failed to replace {}", path.display()))
}
