use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use codepad_platform::sandbox::SandboxFs;

use crate::confined;

/// Sandbox filesystem backed by a local directory
pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SandboxFs for LocalSandbox {
    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let target = confined(&self.root, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create parent dirs for {}", path))?;
        }
        debug!("sandbox write {} ({} bytes)", path, content.len());
        tokio::fs::write(&target, content)
            .await
            .with_context(|| format!("failed to write file {}", path))
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let target = confined(&self.root, path)?;
        tokio::fs::remove_file(&target)
            .await
            .with_context(|| format!("failed to delete file {}", path))
    }

    async fn remove_directory(&self, path: &str, recursive: bool) -> Result<()> {
        let target = confined(&self.root, path)?;
        if target == self.root {
            anyhow::bail!("refusing to remove the sandbox root");
        }
        let result = if recursive {
            tokio::fs::remove_dir_all(&target).await
        } else {
            tokio::fs::remove_dir(&target).await
        };
        result.with_context(|| format!("failed to delete directory {}", path))
    }

    async fn make_directory(&self, path: &str, recursive: bool) -> Result<()> {
        let target = confined(&self.root, path)?;
        let result = if recursive {
            tokio::fs::create_dir_all(&target).await
        } else {
            tokio::fs::create_dir(&target).await
        };
        result.with_context(|| format!("failed to create directory {}", path))
    }
}
