//! Helpers for deciding whether a stylesheet source is local and where it lives on disk.
//!
//! Origin checks and filesystem canonicalisation are split into focused submodules so they
//! can be tested independently. [`SiteResolver`] combines both behind the [`PathResolver`]
//! seam the planner consumes.

mod canonical;
mod origin;

use std::io;
use std::path::{Path, PathBuf};

use url::Url;

use crate::models::ResolvedPath;

pub use canonical::{resolve_within_root, root_relative_path};
pub use origin::{is_internal_url, site_base, source_path};

/// Maps declared stylesheet sources onto files under a trusted root.
pub trait PathResolver {
  /// Returns `true` when `src` shares an origin with `site`.
  fn is_internal(&self, src: &str, site: &Url) -> bool;

  /// Canonical on-disk location of `src`, or `None` when it cannot be resolved inside the
  /// trusted root.
  fn resolve(&self, src: &str, site: &Url) -> Option<ResolvedPath>;
}

/// Filesystem-backed resolver rooted at a canonicalised directory.
#[derive(Debug, Clone)]
pub struct SiteResolver {
  root: PathBuf,
}

impl SiteResolver {
  /// Canonicalise `root` once so later containment checks compare like with like.
  pub fn new(root: &Path) -> io::Result<Self> {
    Ok(Self {
      root: dunce::canonicalize(root)?,
    })
  }

  /// Canonical trusted root.
  pub fn root(&self) -> &Path {
    &self.root
  }
}

impl PathResolver for SiteResolver {
  fn is_internal(&self, src: &str, site: &Url) -> bool {
    is_internal_url(src, site)
  }

  fn resolve(&self, src: &str, site: &Url) -> Option<ResolvedPath> {
    let relative = source_path(src, site)?;
    resolve_within_root(&self.root, &relative)
  }
}
