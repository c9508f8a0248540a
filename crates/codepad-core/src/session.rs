use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::confirm::Resolution;
use crate::error::Result;
use crate::tree::ProjectPath;
use crate::workspace::Workspace;

/// A user action, as sent by the UI. Paths are `/`-separated and relative to
/// the project root; the root itself is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WorkspaceCommand {
    Open {
        path: ProjectPath,
    },
    Edit {
        content: String,
    },
    Close {
        path: ProjectPath,
    },
    CloseActive,
    CloseAll,
    Save {
        path: ProjectPath,
    },
    SaveActive,
    SaveAll,
    AddFile {
        #[serde(default)]
        parent: ProjectPath,
        name: String,
        #[serde(default)]
        content: String,
    },
    AddFolder {
        #[serde(default)]
        parent: ProjectPath,
        name: String,
    },
    DeleteFile {
        path: ProjectPath,
    },
    DeleteFolder {
        path: ProjectPath,
    },
    RenameFile {
        path: ProjectPath,
        name: String,
    },
    RenameFolder {
        path: ProjectPath,
        name: String,
    },
    MoveFile {
        path: ProjectPath,
        #[serde(default)]
        destination: ProjectPath,
    },
    Resolve {
        resolution: Resolution,
    },
}

impl Workspace {
    /// Run one command to completion
    pub async fn dispatch(&mut self, command: WorkspaceCommand) -> Result<()> {
        debug!("dispatching {:?}", command);
        match command {
            WorkspaceCommand::Open { path } => self.open(&path)?,
            WorkspaceCommand::Edit { content } => self.edit(&content)?,
            WorkspaceCommand::Close { path } => {
                self.close(&path)?;
            }
            WorkspaceCommand::CloseActive => {
                self.close_active()?;
            }
            WorkspaceCommand::CloseAll => {
                self.close_all();
            }
            WorkspaceCommand::Save { path } => self.save(&path).await?,
            WorkspaceCommand::SaveActive => self.save_active().await?,
            WorkspaceCommand::SaveAll => {
                self.save_all().await;
            }
            WorkspaceCommand::AddFile {
                parent,
                name,
                content,
            } => {
                self.add_file(&parent, &name, &content).await?;
            }
            WorkspaceCommand::AddFolder { parent, name } => {
                self.add_folder(&parent, &name).await?;
            }
            WorkspaceCommand::DeleteFile { path } => self.delete_file(&path).await?,
            WorkspaceCommand::DeleteFolder { path } => self.delete_folder(&path).await?,
            WorkspaceCommand::RenameFile { path, name } => {
                self.rename_file(&path, &name).await?;
            }
            WorkspaceCommand::RenameFolder { path, name } => {
                self.rename_folder(&path, &name).await?;
            }
            WorkspaceCommand::MoveFile { path, destination } => {
                self.move_file(&path, &destination).await?;
            }
            WorkspaceCommand::Resolve { resolution } => {
                self.resolve_confirmation(resolution).await?
            }
        }
        Ok(())
    }
}

/// Drive a workspace until the command channel closes.
///
/// Commands and timer fires are handled one at a time, so no operation ever
/// observes another half-done. Pending timers are cancelled on exit and the
/// workspace is handed back.
pub async fn run_session(
    mut workspace: Workspace,
    mut commands: mpsc::Receiver<WorkspaceCommand>,
) -> Workspace {
    info!("session started for project {}", workspace.project_id());

    loop {
        let deadline = workspace.next_deadline();
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => {
                    if let Err(e) = workspace.dispatch(command).await {
                        workspace.report(&e);
                    }
                }
                None => {
                    info!("command channel closed, ending session");
                    break;
                }
            },
            _ = wait_until(deadline) => {
                workspace.fire_due(Instant::now()).await;
            }
        }
    }

    workspace.teardown();
    workspace
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
