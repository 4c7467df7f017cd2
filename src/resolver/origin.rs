use url::Url;

/// Determine whether a stylesheet source is served by the site itself.
///
/// Relative and protocol-relative sources are resolved against `site` first. Hosts and
/// explicit ports must match and the path must sit beneath the site path; the scheme is
/// ignored so `http` and `https` variants of the same site count as internal.
pub fn is_internal_url(src: &str, site: &Url) -> bool {
  let site = site_base(site);
  let Ok(resolved) = site.join(src.trim()) else {
    return false;
  };

  if !matches!(resolved.scheme(), "http" | "https") {
    return false;
  }

  resolved.host_str() == site.host_str()
    && resolved.port() == site.port()
    && resolved.path().starts_with(site.path())
}

/// `site` with its path ending in `/`, so it only prefixes whole path segments.
pub fn site_base(site: &Url) -> Url {
  let mut base = site.clone();
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }
  base
}

/// Path of an internal source relative to the site path, percent-decoded.
///
/// Returns `None` for external sources or paths that cannot be decoded.
pub fn source_path(src: &str, site: &Url) -> Option<String> {
  if !is_internal_url(src, site) {
    return None;
  }

  let site = site_base(site);
  let resolved = site.join(src.trim()).ok()?;
  let relative = resolved.path().strip_prefix(site.path())?;
  let decoded = urlencoding::decode(relative).ok()?;
  if decoded.contains('\0') {
    return None;
  }
  Some(decoded.into_owned())
}
