use anyhow::Result;
use async_trait::async_trait;

use crate::project::{ProjectRecord, TemplateFolder, TemplateItems};

/// Durable storage for projects
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Load the project metadata and its serialized tree, if one was saved
    async fn load_project(&self, id: &str) -> Result<ProjectRecord>;

    /// Replace the saved tree of a project
    async fn save_project(&self, id: &str, tree: &TemplateFolder) -> Result<()>;
}

/// Source of starter trees for projects that were never saved
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    async fn load_template(&self, id: &str) -> Result<TemplateItems>;
}
