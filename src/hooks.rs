//! Extension points a host can use to adjust planning and rendering.

use url::Url;

/// Fixed set of override points consulted during a planning pass.
///
/// Every method defaults to a pass-through, so implementors only override what they need.
pub trait ConcatHooks {
  /// Override of the site base URL used for same-origin checks.
  fn site_url(&self, computed: &Url) -> Url {
    computed.clone()
  }

  /// Rewrite of a registration's source before it is evaluated.
  fn source(&self, _handle: &str, src: &str) -> String {
    src.to_string()
  }

  /// Override of the eligibility decision for `handle`.
  fn allow_concat(&self, _handle: &str, eligible: bool) -> bool {
    eligible
  }

  /// Rewrite of the rendered `<link>` tag of a combined group.
  fn link_tag(&self, tag: String, _handles: &[&str], _href: &str, _media: &str) -> String {
    tag
  }
}

/// Hooks that leave every decision untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ConcatHooks for DefaultHooks {}

impl<T: ConcatHooks + ?Sized> ConcatHooks for &T {
  fn site_url(&self, computed: &Url) -> Url {
    (**self).site_url(computed)
  }

  fn source(&self, handle: &str, src: &str) -> String {
    (**self).source(handle, src)
  }

  fn allow_concat(&self, handle: &str, eligible: bool) -> bool {
    (**self).allow_concat(handle, eligible)
  }

  fn link_tag(&self, tag: String, handles: &[&str], href: &str, media: &str) -> String {
    (**self).link_tag(tag, handles, href, media)
  }
}
