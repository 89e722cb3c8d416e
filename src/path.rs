//! Mount path resolution.
//!
//! Files are addressed by bare names inside a flat mount directory. A name
//! with any directory component, traversal step, or platform separator is
//! rejected before it ever touches the filesystem.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// A filename that cannot be resolved inside a mount directory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid filename: {0:?}")]
pub struct InvalidName(pub String);

/// Join `filename` onto `mount`, rejecting anything that is not a single
/// normal path component.
pub fn resolve_in_mount(mount: &Path, filename: &str) -> Result<PathBuf, InvalidName> {
    if filename.is_empty() || filename.contains('/') || filename.contains('\\') {
        return Err(InvalidName(filename.to_string()));
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(mount.join(filename)),
        _ => Err(InvalidName(filename.to_string())),
    }
}
