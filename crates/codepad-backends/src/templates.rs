use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use codepad_platform::project::TemplateItems;
use codepad_platform::store::TemplateLoader;

use crate::check_id;

/// Loads starter trees from `<dir>/<template>.json`
pub struct DirTemplates {
    root: PathBuf,
}

impl DirTemplates {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl TemplateLoader for DirTemplates {
    async fn load_template(&self, id: &str) -> Result<TemplateItems> {
        check_id(id)?;
        let path = self.root.join(format!("{}.json", id));
        let data = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read template {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("failed to parse template {}", path.display()))
    }
}
