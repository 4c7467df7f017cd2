use std::path::Path;

use crate::identifier::PATH_LIST_DELIMITER;
use crate::models::ResolvedPath;

/// Canonicalise `relative` beneath `root`, refusing anything that escapes it.
///
/// `root` must already be canonical. Missing files, directories, symlinks that point
/// outside the root and names containing the path list delimiter all yield `None`.
pub fn resolve_within_root(root: &Path, relative: &str) -> Option<ResolvedPath> {
  let trimmed = relative.trim_start_matches('/');
  if trimmed.is_empty() {
    return None;
  }

  let canonical = dunce::canonicalize(root.join(trimmed)).ok()?;
  if !canonical.is_file() {
    return None;
  }

  let root_relative = root_relative_path(root, &canonical)?;
  if root_relative.contains(PATH_LIST_DELIMITER) {
    return None;
  }
  Some(ResolvedPath {
    canonical,
    root_relative,
  })
}

/// Produce the `/`-prefixed, forward-slash path of `canonical` relative to `root`.
///
/// The result uses forward slashes on every platform so combined URLs are identical
/// regardless of the native directory separator.
pub fn root_relative_path(root: &Path, canonical: &Path) -> Option<String> {
  let relative = canonical.strip_prefix(root).ok()?;
  let joined = relative
    .components()
    .map(|component| component.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/");
  if joined.is_empty() {
    return None;
  }
  Some(format!("/{joined}").replace('\\', "/"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  #[test]
  fn resolves_existing_files_under_root() {
    let dir = tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    fs::create_dir_all(root.join("theme")).unwrap();
    fs::write(root.join("theme/style.css"), "a{}").unwrap();

    let resolved = resolve_within_root(&root, "theme/./style.css").unwrap();
    assert_eq!(resolved.root_relative, "/theme/style.css");
    assert_eq!(resolved.canonical, root.join("theme").join("style.css"));
  }

  #[test]
  fn refuses_traversal_outside_root() {
    let dir = tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap().join("site");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.parent().unwrap().join("secret.css"), "a{}").unwrap();

    assert_eq!(resolve_within_root(&root, "../secret.css"), None);
  }

  #[test]
  fn refuses_missing_files_and_directories() {
    let dir = tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    fs::create_dir_all(root.join("theme")).unwrap();

    assert_eq!(resolve_within_root(&root, "theme/missing.css"), None);
    assert_eq!(resolve_within_root(&root, "theme"), None);
    assert_eq!(resolve_within_root(&root, "/"), None);
  }

  #[test]
  fn refuses_names_that_cannot_be_listed() {
    let dir = tempdir().unwrap();
    let root = dunce::canonicalize(dir.path()).unwrap();
    fs::write(root.join("a,b.css"), "a{}").unwrap();

    assert_eq!(resolve_within_root(&root, "a,b.css"), None);
  }
}
