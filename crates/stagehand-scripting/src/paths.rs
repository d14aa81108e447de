//! Path normalization and file-URL helpers.
//!
//! Asset paths are used as cache keys and compared after the file on disk may
//! already be gone, so normalization here is purely lexical and never touches
//! the file system.

use std::path::{Component, Path, PathBuf};
use url::Url;

use crate::error::{Result, ScriptingError};

/// Lexically normalize a path: resolve `.` and `..` segments and collapse
/// redundant separators.
///
/// A leading `..` on a relative path is dropped, matching the usual lexical
/// normalization rules.
pub fn normalize(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    let mut normalized = match components.peek() {
        Some(Component::Prefix(prefix)) => {
            let buf = PathBuf::from(prefix.as_os_str());
            components.next();
            buf
        }
        _ => PathBuf::new(),
    };

    for component in components {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }

    normalized
}

/// Derive the `file://` URL for an asset path.
///
/// Fails for paths that cannot be expressed as a file URL (notably relative
/// paths); asset databases always report absolute paths.
pub fn file_url(path: &Path) -> Result<Url> {
    Url::from_file_path(path).map_err(|_| ScriptingError::InvalidPath {
        path: path.to_path_buf(),
    })
}
