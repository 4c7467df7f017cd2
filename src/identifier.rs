//! Encoded path lists and freshness tokens addressing combined payloads.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose};

use crate::error::{DeliveryError, PlanError};
use crate::models::{Group, GroupIdentifier, GroupKind};

/// Separator between root-relative paths before encoding.
pub const PATH_LIST_DELIMITER: char = ',';

/// Modification times already read during the current pass.
#[derive(Debug, Default)]
pub struct MtimeCache {
  seen: HashMap<PathBuf, i64>,
}

impl MtimeCache {
  /// Empty cache for a new pass.
  pub fn new() -> Self {
    Self::default()
  }

  /// Modification time of `path` in seconds since the Unix epoch.
  pub fn mtime(&mut self, path: &Path) -> Result<i64, PlanError> {
    if let Some(seconds) = self.seen.get(path) {
      return Ok(*seconds);
    }

    let seconds = file_mtime(path).map_err(|source| PlanError::Freshness {
      path: path.to_path_buf(),
      source,
    })?;
    self.seen.insert(path.to_path_buf(), seconds);
    Ok(seconds)
  }
}

/// Build the identifier of a combined group.
///
/// Member files are stat'ed right before the URL is built, so a file removed since the
/// eligibility check fails the whole group.
pub fn identify(group: &Group, cache: &mut MtimeCache) -> Result<GroupIdentifier, PlanError> {
  if group.kind != GroupKind::Combined {
    return Err(PlanError::NotCombined { index: group.index });
  }

  let mut paths = Vec::with_capacity(group.members.len());
  let mut freshness = i64::MIN;
  for member in &group.members {
    let resolved = member.path.as_ref().ok_or_else(|| PlanError::Unresolved {
      index: group.index,
      handle: member.handle().to_string(),
    })?;
    freshness = freshness.max(cache.mtime(&resolved.canonical)?);
    paths.push(resolved.root_relative.as_str());
  }

  Ok(GroupIdentifier {
    encoded_path_list: encode_path_list(&paths),
    freshness,
  })
}

/// Join, base64 encode and URL escape root-relative paths.
pub fn encode_path_list<S: AsRef<str>>(paths: &[S]) -> String {
  let joined = paths
    .iter()
    .map(AsRef::as_ref)
    .collect::<Vec<_>>()
    .join(&PATH_LIST_DELIMITER.to_string());
  let encoded = general_purpose::STANDARD.encode(joined.as_bytes());
  urlencoding::encode(&encoded).into_owned()
}

/// Reverse [`encode_path_list`].
///
/// Accepts values that were already percent-decoded by an HTTP layer, since base64 output
/// never contains `%`.
pub fn decode_path_list(encoded: &str) -> Result<Vec<String>, DeliveryError> {
  let unescaped = urlencoding::decode(encoded.trim()).map_err(|_| DeliveryError::MalformedPathList)?;
  let bytes = general_purpose::STANDARD
    .decode(unescaped.as_bytes())
    .map_err(|_| DeliveryError::MalformedPathList)?;
  let joined = String::from_utf8(bytes).map_err(|_| DeliveryError::MalformedPathList)?;

  let paths: Vec<String> = joined
    .split(PATH_LIST_DELIMITER)
    .filter(|path| !path.is_empty())
    .map(str::to_string)
    .collect();
  if paths.is_empty() {
    return Err(DeliveryError::EmptyPathList);
  }
  Ok(paths)
}

/// Modification time of `path` in whole seconds relative to the Unix epoch.
pub fn file_mtime(path: &Path) -> std::io::Result<i64> {
  let modified = fs::metadata(path)?.modified()?;
  Ok(unix_seconds(modified))
}

fn unix_seconds(time: SystemTime) -> i64 {
  match time.duration_since(UNIX_EPOCH) {
    Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
    Err(before) => i64::try_from(before.duration().as_secs()).map_or(i64::MIN, |secs| -secs),
  }
}
