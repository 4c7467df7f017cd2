//! Framework-free side of the delivery endpoint: decode, validate, concatenate.
//!
//! A front controller parses the query into a [`DeliveryRequest`], hands it to
//! [`ConcatDelivery::deliver`] and copies the [`DeliveryResponse`] onto its HTTP response.
//! Everything here is a pure read of the files named by the request, so it is safe to call
//! concurrently.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use blake3::Hasher;
use regex::Regex;

use crate::config::ConcatConfig;
use crate::eligibility::is_servable_stylesheet;
use crate::error::DeliveryError;
use crate::identifier::{decode_path_list, file_mtime};

/// Content type of every combined payload.
pub const CONTENT_TYPE: &str = "text/css; charset=utf-8";

/// Parsed delivery query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
  /// Root-relative paths, in concatenation order.
  pub paths: Vec<String>,
  /// Freshness token the page was rendered with.
  pub freshness: i64,
  /// Whether the page allowed transport compression.
  pub compress: bool,
}

impl DeliveryRequest {
  /// Parse the raw query string (`load`, `m` and `c`; other parameters are ignored).
  pub fn from_query(query: &str) -> Result<Self, DeliveryError> {
    let mut load = None;
    let mut mtime = None;
    let mut compress = None;

    for pair in query.trim_start_matches('?').split('&') {
      let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
      match name {
        "load" => load = Some(value),
        "m" => mtime = Some(value),
        "c" => compress = Some(value),
        _ => {}
      }
    }

    let load = load.ok_or(DeliveryError::MissingParameter("load"))?;
    let mtime = mtime.ok_or(DeliveryError::MissingParameter("m"))?;
    let compress = compress.ok_or(DeliveryError::MissingParameter("c"))?;

    let freshness = mtime
      .parse::<i64>()
      .map_err(|_| DeliveryError::InvalidParameter {
        name: "m",
        value: mtime.to_string(),
      })?;
    let compress = match compress {
      "0" => false,
      "1" => true,
      other => {
        return Err(DeliveryError::InvalidParameter {
          name: "c",
          value: other.to_string(),
        });
      }
    };

    Ok(Self {
      paths: decode_path_list(load)?,
      freshness,
      compress,
    })
  }
}

/// Everything a front controller needs to answer a delivery request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResponse {
  /// Raw concatenation of the listed files.
  pub body: Vec<u8>,
  /// Always [`CONTENT_TYPE`].
  pub content_type: &'static str,
  /// Latest modification time actually found on disk, in Unix seconds.
  pub last_modified: i64,
  /// Strong validator derived from the payload bytes.
  pub etag: String,
  /// `Cache-Control` header value.
  pub cache_control: String,
  /// Whether the body should be gzip-encoded on the wire.
  pub compress: bool,
}

/// Serves combined payloads from files under a trusted root.
#[derive(Debug, Clone)]
pub struct ConcatDelivery {
  root: PathBuf,
  cache_max_age: u64,
}

impl ConcatDelivery {
  /// Delivery rooted at `root`, which is canonicalised once here.
  pub fn new(root: &Path, cache_max_age: u64) -> Result<Self, DeliveryError> {
    let root = dunce::canonicalize(root).map_err(|source| DeliveryError::Root {
      path: root.to_path_buf(),
      source,
    })?;
    Ok(Self {
      root,
      cache_max_age,
    })
  }

  /// Delivery configured like the planner that produced the links.
  pub fn from_config(config: &ConcatConfig) -> Result<Self, DeliveryError> {
    Self::new(&config.trusted_root, config.cache_max_age)
  }

  /// Read and concatenate every listed file in order.
  ///
  /// Bytes are appended untouched. When the files on disk are newer than the request's
  /// freshness token the response is still served but marked `no-cache`, so a stale URL
  /// never pins outdated styles in shared caches.
  pub fn deliver(
    &self,
    request: &DeliveryRequest,
    accept_encoding: Option<&str>,
  ) -> Result<DeliveryResponse, DeliveryError> {
    let mut body = Vec::new();
    let mut last_modified = i64::MIN;

    for listed in &request.paths {
      let path = self.validate_path(listed)?;
      let bytes = fs::read(&path).map_err(|source| read_error(listed, &path, source))?;
      let mtime = file_mtime(&path).map_err(|source| read_error(listed, &path, source))?;
      last_modified = last_modified.max(mtime);
      body.extend_from_slice(&bytes);
    }

    let cache_control = if last_modified > request.freshness {
      tracing::debug!(
        requested = request.freshness,
        on_disk = last_modified,
        "serving combined stylesheet for a stale freshness token"
      );
      "no-cache".to_string()
    } else {
      format!("public, max-age={}", self.cache_max_age)
    };

    let mut hasher = Hasher::new();
    hasher.update(&body);
    let digest = hasher.finalize().to_hex();
    let etag = format!("\"{}\"", &digest.as_str()[..32]);

    Ok(DeliveryResponse {
      body,
      content_type: CONTENT_TYPE,
      last_modified,
      etag,
      cache_control,
      compress: request.compress && accept_encoding.is_some_and(accepts_gzip),
    })
  }

  /// Map a listed root-relative path onto a stylesheet file inside the trusted root.
  pub fn validate_path(&self, listed: &str) -> Result<PathBuf, DeliveryError> {
    let invalid = || DeliveryError::InvalidPath(listed.to_string());

    let relative = listed.strip_prefix('/').ok_or_else(invalid)?;
    if relative.is_empty()
      || relative.contains(['\0', '\\'])
      || relative.split('/').any(|segment| segment == "..")
      || !is_servable_stylesheet(relative)
    {
      return Err(invalid());
    }

    let candidate = self.root.join(relative);
    let canonical = match dunce::canonicalize(&candidate) {
      Ok(path) => path,
      Err(err) if err.kind() == ErrorKind::NotFound => {
        return Err(DeliveryError::NotFound(listed.to_string()));
      }
      Err(source) => {
        return Err(DeliveryError::Io {
          path: candidate,
          source,
        });
      }
    };

    if !canonical.starts_with(&self.root) {
      return Err(DeliveryError::OutsideRoot(listed.to_string()));
    }
    if !canonical.is_file() {
      return Err(DeliveryError::NotFound(listed.to_string()));
    }
    Ok(canonical)
  }
}

fn read_error(listed: &str, path: &Path, source: std::io::Error) -> DeliveryError {
  if source.kind() == ErrorKind::NotFound {
    DeliveryError::NotFound(listed.to_string())
  } else {
    DeliveryError::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}

fn gzip_coding() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?i)^\s*(x-gzip|gzip|\*)\s*(?:;\s*q\s*=\s*([0-9.]+))?\s*$")
      .expect("invalid accept-encoding regex")
  })
}

/// Whether an `Accept-Encoding` header value allows gzip with a non-zero quality.
///
/// An explicit `gzip` entry decides; `*` only applies when gzip is not listed.
pub fn accepts_gzip(header: &str) -> bool {
  let mut wildcard = None;
  for coding in header.split(',') {
    let Some(caps) = gzip_coding().captures(coding) else {
      continue;
    };
    let allowed = caps
      .get(2)
      .is_none_or(|q| q.as_str().parse::<f32>().is_ok_and(|q| q > 0.0));
    if &caps[1] == "*" {
      wildcard = Some(allowed);
    } else {
      return allowed;
    }
  }
  wildcard.unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::identifier::encode_path_list;
  use pretty_assertions::assert_eq;
  use std::fs::File;
  use std::time::{Duration, UNIX_EPOCH};
  use tempfile::{TempDir, tempdir};

  fn site() -> (TempDir, ConcatDelivery) {
    let dir = tempdir().unwrap();
    let root = dir.path().join("site");
    fs::create_dir_all(root.join("theme")).unwrap();
    write(&root.join("theme/a.css"), "a{}\n", 100);
    write(&root.join("theme/b.css"), "b{}", 300);
    fs::write(root.join("theme/readme.txt"), "text").unwrap();
    fs::write(dir.path().join("secret.css"), "secret{}").unwrap();
    let delivery = ConcatDelivery::new(&root, 600).unwrap();
    (dir, delivery)
  }

  fn write(path: &Path, contents: &str, seconds: u64) {
    fs::write(path, contents).unwrap();
    File::options()
      .write(true)
      .open(path)
      .unwrap()
      .set_modified(UNIX_EPOCH + Duration::from_secs(seconds))
      .unwrap();
  }

  fn query(paths: &[&str], mtime: i64, compress: bool) -> String {
    format!(
      "load={}&m={mtime}&c={}",
      encode_path_list(paths),
      u8::from(compress)
    )
  }

  #[test]
  fn parses_query_parameters_in_any_order() {
    let load = encode_path_list(&["/a.css"]);
    let request = DeliveryRequest::from_query(&format!("?c=1&ver=2&m=42&load={load}")).unwrap();
    assert_eq!(request, DeliveryRequest {
      paths: vec!["/a.css".into()],
      freshness: 42,
      compress: true,
    });
  }

  #[test]
  fn rejects_missing_and_malformed_parameters() {
    assert!(matches!(
      DeliveryRequest::from_query("m=1&c=0"),
      Err(DeliveryError::MissingParameter("load"))
    ));
    let load = encode_path_list(&["/a.css"]);
    assert!(matches!(
      DeliveryRequest::from_query(&format!("load={load}&m=soon&c=0")),
      Err(DeliveryError::InvalidParameter { name: "m", .. })
    ));
    assert!(matches!(
      DeliveryRequest::from_query(&format!("load={load}&m=1&c=yes")),
      Err(DeliveryError::InvalidParameter { name: "c", .. })
    ));
  }

  #[test]
  fn concatenates_files_in_listed_order() {
    let (_dir, delivery) = site();
    let request =
      DeliveryRequest::from_query(&query(&["/theme/b.css", "/theme/a.css"], 300, false)).unwrap();

    let response = delivery.deliver(&request, Some("gzip")).unwrap();
    assert_eq!(response.body, b"b{}a{}\n".to_vec());
    assert_eq!(response.content_type, CONTENT_TYPE);
    assert_eq!(response.last_modified, 300);
    assert_eq!(response.cache_control, "public, max-age=600");
    assert!(!response.compress);
  }

  #[test]
  fn repeated_requests_are_byte_identical() {
    let (_dir, delivery) = site();
    let request =
      DeliveryRequest::from_query(&query(&["/theme/a.css", "/theme/b.css"], 300, true)).unwrap();

    let first = delivery.deliver(&request, Some("br, gzip")).unwrap();
    let second = delivery.deliver(&request, Some("br, gzip")).unwrap();
    assert_eq!(first, second);
    assert!(first.compress);
  }

  #[test]
  fn stale_tokens_are_not_cached() {
    let (_dir, delivery) = site();
    let request = DeliveryRequest::from_query(&query(&["/theme/b.css"], 200, false)).unwrap();

    let response = delivery.deliver(&request, None).unwrap();
    assert_eq!(response.cache_control, "no-cache");
  }

  #[test]
  fn refuses_paths_outside_root_or_non_stylesheets() {
    let (_dir, delivery) = site();
    for (path, status) in [
      ("theme/a.css", 403),
      ("/../secret.css", 403),
      ("/theme/readme.txt", 403),
      ("/theme/missing.css", 404),
    ] {
      let err = delivery.validate_path(path).unwrap_err();
      assert_eq!(err.status(), status, "{path}");
    }
  }

  #[test]
  fn refuses_symlinks_escaping_the_root() {
    #[cfg(unix)]
    {
      let (dir, delivery) = site();
      std::os::unix::fs::symlink(
        dir.path().join("secret.css"),
        dir.path().join("site/theme/link.css"),
      )
      .unwrap();

      assert!(matches!(
        delivery.validate_path("/theme/link.css"),
        Err(DeliveryError::OutsideRoot(_))
      ));
    }
  }

  #[test]
  fn understands_accept_encoding_qualities() {
    assert!(accepts_gzip("gzip, deflate"));
    assert!(accepts_gzip("br;q=1.0, GZIP;q=0.5"));
    assert!(accepts_gzip("*"));
    assert!(!accepts_gzip("gzip;q=0"));
    assert!(!accepts_gzip("gzip;q=0, *"));
    assert!(!accepts_gzip("*, gzip;q=0"));
    assert!(accepts_gzip("br, *;q=0.1"));
    assert!(!accepts_gzip("*;q=0"));
    assert!(!accepts_gzip("br, deflate"));
    assert!(!accepts_gzip("gzipped"));
  }
}
