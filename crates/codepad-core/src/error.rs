use thiserror::Error;

pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("folder not found: {path}")]
    FolderNotFound { path: String },
    #[error("file not found: {path}")]
    FileNotFound { path: String },
    #[error("no open buffer for {id}")]
    BufferNotOpen { id: String },
    #[error("{path} already exists")]
    AlreadyExists { path: String },
    #[error("invalid name: {name:?}")]
    InvalidName { name: String },
    #[error("failed to persist project {project}: {reason:#}")]
    Persistence {
        project: String,
        reason: anyhow::Error,
    },
    #[error("sandbox update failed for {path}: {reason:#}")]
    Mirror { path: String, reason: anyhow::Error },
    #[error("failed to load template {template}: {reason:#}")]
    Template {
        template: String,
        reason: anyhow::Error,
    },
    #[error("config error: {0}")]
    Config(String),
}

impl WorkspaceError {
    /// Errors that leave the workspace untouched and only need a user retry
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::FolderNotFound { .. }
                | Self::FileNotFound { .. }
                | Self::BufferNotOpen { .. }
                | Self::AlreadyExists { .. }
                | Self::InvalidName { .. }
        )
    }
}
