// Workspace synchronization engine: tree model, open buffers, debounced
// sandbox/store sync and structural mutations.

pub mod buffers;
pub mod config;
pub mod confirm;
pub mod error;
pub mod events;
pub mod language;
pub mod mutation;
pub mod scheduler;
pub mod session;
pub mod tree;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, WorkspaceError};
pub use tree::{ProjectPath, Tree};
pub use workspace::Workspace;
