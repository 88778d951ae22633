//! Home-directory expansion for user supplied paths.

use std::path::{Path, PathBuf};

/// Expands a leading `~` to the current user's home directory.
///
/// Only `~` and `~/...` are expanded; `~user` forms and paths without a
/// tilde are returned unchanged. If the home directory cannot be determined
/// the path is returned as given.
pub fn resolve_path(path: &str) -> PathBuf {
    resolve_path_with_home(path, dirs::home_dir().as_deref())
}

/// Same as [`resolve_path`] with an explicit home directory.
pub fn resolve_path_with_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}
