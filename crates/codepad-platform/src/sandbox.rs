use anyhow::Result;
use async_trait::async_trait;

/// Filesystem of the ephemeral execution sandbox.
///
/// Paths are slash-delimited and relative to the sandbox's project root.
#[async_trait]
pub trait SandboxFs: Send + Sync {
    /// Write a file, replacing any previous content
    async fn write_file(&self, path: &str, content: &str) -> Result<()>;

    /// Remove a single file
    async fn remove_file(&self, path: &str) -> Result<()>;

    /// Remove a directory, with its contents when `recursive` is set
    async fn remove_directory(&self, path: &str, recursive: bool) -> Result<()>;

    /// Create a directory, with missing parents when `recursive` is set
    async fn make_directory(&self, path: &str, recursive: bool) -> Result<()>;
}
