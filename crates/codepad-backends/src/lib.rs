// Concrete project stores, template loaders and sandbox filesystems

pub mod dir_store;
pub mod http_store;
pub mod sandbox;
pub mod templates;

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Result};

/// Join a slash-delimited relative path onto `root`, refusing anything that
/// would escape it
pub(crate) fn confined(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut out = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => bail!("path {:?} escapes {}", relative, root.display()),
        }
    }
    Ok(out)
}

/// Reject ids that cannot be used as a single file name
pub(crate) fn check_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
        bail!("invalid id {:?}", id);
    }
    Ok(())
}
